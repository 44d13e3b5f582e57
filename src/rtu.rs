// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request/response exchange on an RTU line

use std::time::Instant;

use smallvec::SmallVec;

use crate::{
    codec::{
        self,
        rtu::{response_frame_len, MAX_ADU_LEN},
    },
    config::Config,
    frame::rtu::Frame,
    transport::{Clock, SystemClock, Transport},
    Error, FunctionCode, Request, Response, Result, Slave,
};

/// Phase of the exchange currently running on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Sending,
    AwaitingResponse,
}

/// How the most recent exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A frame was sent and, unless broadcast, a reply was received.
    Complete,
    /// The reply did not arrive completely in time.
    TimedOut,
    /// The transport failed.
    LineError,
}

/// Counters accumulated over the lifetime of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub timeouts: u64,
    pub checksum_errors: u64,
    pub exceptions: u64,
}

/// Token for a request that has been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub(crate) function_code: FunctionCode,
    pub(crate) slave: Slave,
    pub(crate) sent_at: Instant,
}

impl RequestContext {
    #[must_use]
    pub const fn function_code(&self) -> FunctionCode {
        self.function_code
    }

    #[must_use]
    pub const fn slave(&self) -> Slave {
        self.slave
    }

    /// Broadcasts are never answered.
    #[must_use]
    pub fn expects_reply(&self) -> bool {
        !self.slave.is_broadcast()
    }
}

/// Exclusive owner of an RTU line.
///
/// At most one request is outstanding at any time.
#[derive(Debug)]
pub struct Session<T, C = SystemClock> {
    transport: T,
    clock: C,
    config: Config,
    state: State,
    pending: Option<RequestContext>,
    last_outcome: Option<Outcome>,
    stats: SessionStats,
    bus_idle_since: Option<Instant>,
    last_was_broadcast: bool,
}

impl<T> Session<T>
where
    T: Transport,
{
    pub fn new(transport: T, config: Config) -> Self {
        Self::with_clock(transport, SystemClock, config)
    }
}

impl<T, C> Session<T, C>
where
    T: Transport,
    C: Clock,
{
    pub fn with_clock(transport: T, clock: C, config: Config) -> Self {
        Self {
            transport,
            clock,
            config,
            state: State::Idle,
            pending: None,
            last_outcome: None,
            stats: SessionStats::default(),
            bus_idle_since: None,
            last_was_broadcast: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub const fn last_outcome(&self) -> Option<Outcome> {
        self.last_outcome
    }

    #[must_use]
    pub const fn stats(&self) -> SessionStats {
        self.stats
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Gives up the session and returns the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Sends `request` and waits for the matching response.
    ///
    /// Broadcast writes return the response the request implies
    /// without waiting for a reply.
    pub fn call(&mut self, slave: Slave, request: &Request<'_>) -> Result<Response> {
        let request_context = self.send_request(slave, request)?;
        if !request_context.expects_reply() {
            return codec::assumed_write_response(request);
        }
        let frame = self.recv_response(request_context)?;
        let result = codec::decode_response(request, frame.function, &frame.payload);
        if let Err(Error::Exception(rsp)) = &result {
            log::debug!("Slave {slave} rejected request: {rsp}");
            self.stats.exceptions += 1;
        }
        result
    }

    /// Transmits `request` after the mandatory bus silence.
    ///
    /// # Errors
    ///
    /// [`Error::SessionBusy`] while a previous request still awaits its
    /// response.
    pub fn send_request(&mut self, slave: Slave, request: &Request<'_>) -> Result<RequestContext> {
        if self.state != State::Idle {
            return Err(Error::SessionBusy);
        }
        let function_code = request.function_code();
        if slave.is_broadcast() && function_code.is_read() {
            return Err(Error::InvalidArgument(format!(
                "function {function_code} cannot be broadcast"
            )));
        }
        let payload = codec::encode_request(request)?;
        let adu = codec::rtu::encode(slave, function_code, &payload)?;

        self.wait_for_silence();
        self.state = State::Sending;
        let sent = self
            .transport
            .discard_input()
            .and_then(|()| self.transport.write(&adu));
        if let Err(err) = sent {
            log::warn!("Failed to send request to slave {slave}: {err}");
            self.finish(Outcome::LineError);
            return Err(err.into());
        }
        log::trace!("Sent {:02X?}", &adu[..]);

        let sent_at = self.clock.now();
        self.stats.requests_sent += 1;
        self.bus_idle_since = Some(sent_at);
        self.last_was_broadcast = slave.is_broadcast();

        let request_context = RequestContext {
            function_code,
            slave,
            sent_at,
        };
        if request_context.expects_reply() {
            self.state = State::AwaitingResponse;
            self.pending = Some(request_context);
        } else {
            self.finish(Outcome::Complete);
        }
        Ok(request_context)
    }

    /// Receives the reply to the request identified by `request_context`.
    ///
    /// Reading stops as soon as the frame length derived from the header
    /// is reached, when the inter-character timeout elapses, or when the
    /// response timeout elapses.
    pub fn recv_response(&mut self, request_context: RequestContext) -> Result<Frame> {
        if self.pending != Some(request_context) {
            return Err(Error::InvalidArgument(
                "no reply pending for this request".to_owned(),
            ));
        }
        let result = self.read_frame(request_context);
        let outcome = match &result {
            Err(Error::Transport(_)) => Outcome::LineError,
            Err(Error::NoResponse | Error::TruncatedFrame { .. }) => Outcome::TimedOut,
            _ => Outcome::Complete,
        };
        match &result {
            Ok(_) => self.stats.responses_received += 1,
            Err(Error::Checksum { .. }) => self.stats.checksum_errors += 1,
            Err(Error::NoResponse | Error::TruncatedFrame { .. }) => self.stats.timeouts += 1,
            Err(_) => {}
        }
        self.bus_idle_since = Some(self.clock.now());
        self.finish(outcome);
        result
    }

    fn read_frame(&mut self, request_context: RequestContext) -> Result<Frame> {
        let response_deadline = request_context.sent_at + self.config.response_timeout;
        let mut buf: SmallVec<[u8; MAX_ADU_LEN]> = SmallVec::new();
        let mut chunk = [0u8; MAX_ADU_LEN];
        let mut last_byte_at = request_context.sent_at;

        let expected_len = loop {
            let expected_len = response_frame_len(&buf);
            // a corrupted byte count may announce more than a frame can hold
            let limit = expected_len.map_or(MAX_ADU_LEN, |len| len.min(MAX_ADU_LEN));
            if buf.len() >= limit {
                break expected_len;
            }
            let deadline = if buf.is_empty() {
                response_deadline
            } else {
                response_deadline.min(last_byte_at + self.config.inter_char_timeout)
            };
            let n = self
                .transport
                .read_available(&mut chunk[..limit - buf.len()], deadline)?;
            if n == 0 {
                break expected_len;
            }
            buf.extend_from_slice(&chunk[..n]);
            last_byte_at = self.clock.now();
        };

        if buf.is_empty() {
            log::debug!(
                "No response from slave {} within {:?}",
                request_context.slave,
                self.config.response_timeout
            );
            return Err(Error::NoResponse);
        }
        log::trace!("Received {:02X?}", &buf[..]);
        let frame_len = match expected_len {
            Some(expected) if buf.len() < expected => {
                return Err(Error::TruncatedFrame {
                    received: buf.len(),
                    expected,
                });
            }
            Some(expected) => expected,
            None => buf.len(),
        };

        let frame = codec::rtu::decode(&buf[..frame_len])?;
        if frame.slave != request_context.slave.0 {
            return Err(Error::MalformedResponse(format!(
                "response from slave {}, expected {}",
                Slave(frame.slave),
                request_context.slave
            )));
        }
        Ok(frame)
    }

    fn wait_for_silence(&self) {
        let Some(idle_since) = self.bus_idle_since else {
            return;
        };
        let mut silence = self.config.inter_frame_delay(self.transport.baud_rate());
        if self.last_was_broadcast {
            silence = silence.max(self.config.broadcast_turnaround);
        }
        self.clock.sleep_until(idle_since + silence);
    }

    fn finish(&mut self, outcome: Outcome) {
        self.pending = None;
        self.state = State::Idle;
        self.last_outcome = Some(outcome);
    }
}
