// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    io,
    rc::Rc,
    time::{Duration, Instant},
};

use modbus_rtu_master::{
    client::{rtu::Master, Client, Context},
    codec, Clock, Config, FunctionCode, Slave, Transport,
};

/// Clock that only moves when the code under test waits.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Rc::default(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    pub fn advance(&self, duration: Duration) {
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

/// What the slave does after one written frame.
#[derive(Debug, Clone)]
pub enum Reply {
    Silence,
    /// Arrives completely right after the request.
    Frame(Vec<u8>),
    /// Chunks arriving at the given offsets after the request.
    Timed(Vec<(Duration, Vec<u8>)>),
    /// The next read fails.
    ReadError(io::ErrorKind),
}

#[derive(Debug, Default)]
pub struct Wire {
    pub written: Vec<Vec<u8>>,
    pub reads: usize,
    pub discarded: usize,
    replies: VecDeque<Reply>,
    input: VecDeque<(Instant, u8)>,
    read_error: Option<io::ErrorKind>,
}

/// Serial line stub that answers each written frame with the next
/// scripted reply. An exhausted script means silence.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    clock: ManualClock,
    wire: Rc<RefCell<Wire>>,
}

impl ScriptedTransport {
    pub fn new(clock: &ManualClock, replies: impl IntoIterator<Item = Reply>) -> Self {
        let wire = Wire {
            replies: replies.into_iter().collect(),
            ..Wire::default()
        };
        Self {
            clock: clock.clone(),
            wire: Rc::new(RefCell::new(wire)),
        }
    }

    pub fn wire(&self) -> Rc<RefCell<Wire>> {
        Rc::clone(&self.wire)
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, frame: &[u8]) -> io::Result<()> {
        let now = self.clock.now();
        let mut wire = self.wire.borrow_mut();
        wire.written.push(frame.to_vec());
        match wire.replies.pop_front() {
            Some(Reply::Frame(bytes)) => {
                wire.input.extend(bytes.into_iter().map(|b| (now, b)));
            }
            Some(Reply::Timed(chunks)) => {
                for (offset, bytes) in chunks {
                    let at = now + offset;
                    wire.input.extend(bytes.into_iter().map(|b| (at, b)));
                }
            }
            Some(Reply::ReadError(kind)) => wire.read_error = Some(kind),
            Some(Reply::Silence) | None => {}
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8], deadline: Instant) -> io::Result<usize> {
        let mut wire = self.wire.borrow_mut();
        wire.reads += 1;
        if let Some(kind) = wire.read_error.take() {
            return Err(kind.into());
        }
        match wire.input.front() {
            Some(&(at, _)) if at <= deadline => self.clock.sleep_until(at),
            _ => {
                self.clock.sleep_until(deadline);
                return Ok(0);
            }
        }
        let now = self.clock.now();
        let mut n = 0;
        while n < buf.len() {
            match wire.input.front() {
                Some(&(at, byte)) if at <= now => {
                    buf[n] = byte;
                    wire.input.pop_front();
                    n += 1;
                }
                _ => break,
            }
        }
        Ok(n)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        let now = self.clock.now();
        let mut wire = self.wire.borrow_mut();
        while matches!(wire.input.front(), Some(&(at, _)) if at <= now) {
            wire.input.pop_front();
            wire.discarded += 1;
        }
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        9600
    }
}

/// A complete reply frame including its checksum.
pub fn reply(slave: u8, function: FunctionCode, payload: &[u8]) -> Vec<u8> {
    codec::rtu::encode(Slave(slave), function, payload)
        .unwrap()
        .to_vec()
}

/// An exception reply, flagged by the high bit of the function code.
pub fn exception_reply(slave: u8, function: FunctionCode, exception: u8) -> Vec<u8> {
    let mut adu = vec![slave, function.value() | 0x80, exception];
    let crc = codec::crc::checksum(&adu);
    adu.extend_from_slice(&crc.to_le_bytes());
    adu
}

pub fn context(
    transport: ScriptedTransport,
    clock: &ManualClock,
    slave: Slave,
    config: Config,
) -> Context {
    let config = config.with_slave(slave);
    let master = Master::with_clock(transport, clock.clone(), config);
    let client: Box<dyn Client> = Box::new(master);
    Context::from(client)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
