// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The byte channel underneath a session

use std::{
    io,
    thread,
    time::{Duration, Instant},
};

#[cfg(feature = "serial")]
pub mod serial;

/// A half-duplex byte channel, typically a serial line.
///
/// Line parameters (baud rate, parity, stop bits) are configured by the
/// implementor. The session only needs the baud rate to derive the
/// inter-frame silence.
pub trait Transport {
    /// Transmits the complete `frame`.
    fn write(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Reads the bytes available into `buf`, blocking until at least
    /// one byte arrived or `deadline` passed.
    ///
    /// Returns `Ok(0)` only when the deadline passed without input.
    fn read_available(&mut self, buf: &mut [u8], deadline: Instant) -> io::Result<usize>;

    /// Line speed in bits per second.
    fn baud_rate(&self) -> u32;

    /// Drops any input received before the next request.
    fn discard_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, frame: &[u8]) -> io::Result<()> {
        (**self).write(frame)
    }

    fn read_available(&mut self, buf: &mut [u8], deadline: Instant) -> io::Result<usize> {
        (**self).read_available(buf, deadline)
    }

    fn baud_rate(&self) -> u32 {
        (**self).baud_rate()
    }

    fn discard_input(&mut self) -> io::Result<()> {
        (**self).discard_input()
    }
}

/// Source of time for deadlines and delays.
///
/// Swapped out in tests to run timeouts without waiting.
pub trait Clock {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration);

    /// Blocks until `instant` unless it already passed.
    fn sleep_until(&self, instant: Instant) {
        let now = self.now();
        if instant > now {
            self.sleep(instant - now);
        }
    }
}

/// Wall clock time of the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::{
        cell::{Cell, RefCell},
        collections::VecDeque,
        rc::Rc,
    };

    use super::*;

    /// Clock that only advances when asked to.
    #[derive(Debug, Clone)]
    pub(crate) struct ManualClock {
        origin: Instant,
        elapsed: Rc<Cell<Duration>>,
    }

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self {
                origin: Instant::now(),
                elapsed: Rc::default(),
            }
        }

        pub(crate) fn elapsed(&self) -> Duration {
            self.elapsed.get()
        }

        pub(crate) fn advance(&self, duration: Duration) {
            self.elapsed.set(self.elapsed.get() + duration);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.origin + self.elapsed.get()
        }

        fn sleep(&self, duration: Duration) {
            self.advance(duration);
        }
    }

    /// What the device does in reaction to one transmitted frame.
    #[derive(Debug, Clone)]
    pub(crate) enum Reply {
        Silence,
        /// Arrives completely right after the request.
        Bytes(Vec<u8>),
        /// Chunks arriving at the given offsets after the request.
        Timed(Vec<(Duration, Vec<u8>)>),
        /// The next read fails.
        ReadError(io::ErrorKind),
        /// The request itself cannot be written.
        WriteError(io::ErrorKind),
    }

    #[derive(Debug, Default)]
    pub(crate) struct Log {
        pub(crate) written: Vec<(Duration, Vec<u8>)>,
        pub(crate) reads: usize,
        pub(crate) discarded: usize,
    }

    /// Transport that answers every write with the next scripted reply.
    #[derive(Debug)]
    pub(crate) struct MockTransport {
        clock: ManualClock,
        replies: VecDeque<Reply>,
        input: VecDeque<(Instant, u8)>,
        read_error: Option<io::ErrorKind>,
        log: Rc<RefCell<Log>>,
    }

    impl MockTransport {
        pub(crate) fn new(clock: ManualClock, replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                clock,
                replies: replies.into_iter().collect(),
                input: VecDeque::new(),
                read_error: None,
                log: Rc::default(),
            }
        }

        pub(crate) fn log(&self) -> Rc<RefCell<Log>> {
            Rc::clone(&self.log)
        }

        fn schedule(&mut self, at: Instant, bytes: Vec<u8>) {
            self.input.extend(bytes.into_iter().map(|byte| (at, byte)));
        }

        fn has_arrived(&self) -> bool {
            matches!(self.input.front(), Some(&(at, _)) if at <= self.clock.now())
        }
    }

    impl Transport for MockTransport {
        fn write(&mut self, frame: &[u8]) -> io::Result<()> {
            let now = self.clock.now();
            match self.replies.pop_front() {
                Some(Reply::WriteError(kind)) => return Err(kind.into()),
                Some(Reply::Bytes(bytes)) => self.schedule(now, bytes),
                Some(Reply::Timed(chunks)) => {
                    for (offset, bytes) in chunks {
                        self.schedule(now + offset, bytes);
                    }
                }
                Some(Reply::ReadError(kind)) => self.read_error = Some(kind),
                Some(Reply::Silence) | None => {}
            }
            self.log
                .borrow_mut()
                .written
                .push((self.clock.elapsed(), frame.to_vec()));
            Ok(())
        }

        fn read_available(&mut self, buf: &mut [u8], deadline: Instant) -> io::Result<usize> {
            self.log.borrow_mut().reads += 1;
            if let Some(kind) = self.read_error.take() {
                return Err(kind.into());
            }
            match self.input.front() {
                Some(&(at, _)) if at <= deadline => self.clock.sleep_until(at),
                _ => {
                    self.clock.sleep_until(deadline);
                    return Ok(0);
                }
            }
            let mut n = 0;
            while n < buf.len() && self.has_arrived() {
                if let Some((_, byte)) = self.input.pop_front() {
                    buf[n] = byte;
                    n += 1;
                }
            }
            Ok(n)
        }

        fn baud_rate(&self) -> u32 {
            19200
        }

        fn discard_input(&mut self) -> io::Result<()> {
            while self.has_arrived() {
                self.input.pop_front();
                self.log.borrow_mut().discarded += 1;
            }
            Ok(())
        }
    }
}
