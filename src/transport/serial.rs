// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blocking serial line transport

use std::{
    fmt,
    io::{self, Read as _, Write as _},
    time::Instant,
};

use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilder};

use super::Transport;

/// A serial port opened in blocking mode.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    baud_rate: u32,
}

impl SerialTransport {
    /// Opens the port described by `builder`.
    pub fn open(builder: &SerialPortBuilder) -> io::Result<Self> {
        let port = builder.clone().open()?;
        Self::new(port)
    }

    /// Wraps an already opened port.
    pub fn new(port: Box<dyn SerialPort>) -> io::Result<Self> {
        let baud_rate = port.baud_rate()?;
        Ok(Self { port, baud_rate })
    }
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("name", &self.port.name())
            .field("baud_rate", &self.baud_rate)
            .finish()
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, frame: &[u8]) -> io::Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()
    }

    fn read_available(&mut self, buf: &mut [u8], deadline: Instant) -> io::Result<usize> {
        loop {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return Ok(0);
            };
            if remaining.is_zero() {
                return Ok(0);
            }
            self.port.set_timeout(remaining)?;
            match self.port.read(buf) {
                Ok(0) => continue,
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == io::ErrorKind::TimedOut => return Ok(0),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}
