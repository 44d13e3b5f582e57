// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connecting a Modbus RTU context

use std::fmt::Debug;

use super::{Client, Context};

use crate::{
    config::Config,
    rtu::{Session, SessionStats},
    slave::{Slave, SlaveContext},
    transport::{Clock, SystemClock, Transport},
    Error, Request, Response, Result,
};

/// Attach a new client context to the default slave of `config`.
pub fn attach<T>(transport: T, config: Config) -> Context
where
    T: Transport + Debug + 'static,
{
    let client: Box<dyn Client> = Box::new(Master::new(transport, config));
    Context::from(client)
}

/// Attach a new client context to a particular slave device.
pub fn attach_slave<T>(transport: T, slave: Slave, config: Config) -> Context
where
    T: Transport + Debug + 'static,
{
    attach(transport, config.with_slave(slave))
}

/// Open a serial port and connect to a particular slave device.
#[cfg(feature = "serial")]
pub fn connect_slave(
    builder: &tokio_serial::SerialPortBuilder,
    slave: Slave,
    config: Config,
) -> std::io::Result<Context> {
    let transport = crate::transport::serial::SerialTransport::open(builder)?;
    Ok(attach_slave(transport, slave, config))
}

/// Master that retries missing or corrupted replies.
#[derive(Debug)]
pub struct Master<T, C = SystemClock> {
    session: Session<T, C>,
    slave: Slave,
}

impl<T> Master<T>
where
    T: Transport,
{
    pub fn new(transport: T, config: Config) -> Self {
        Self::with_clock(transport, SystemClock, config)
    }
}

impl<T, C> Master<T, C>
where
    T: Transport,
    C: Clock,
{
    pub fn with_clock(transport: T, clock: C, config: Config) -> Self {
        let slave = config.slave;
        Self {
            session: Session::with_clock(transport, clock, config),
            slave,
        }
    }

    #[must_use]
    pub const fn slave(&self) -> Slave {
        self.slave
    }

    #[must_use]
    pub const fn session(&self) -> &Session<T, C> {
        &self.session
    }

    #[must_use]
    pub const fn stats(&self) -> SessionStats {
        self.session.stats()
    }

    /// Sends `request` to `slave`, repeating it on timeouts and
    /// corrupted replies.
    pub fn call_slave(&mut self, slave: Slave, request: &Request<'_>) -> Result<Response> {
        if slave.is_reserved() {
            return Err(Error::InvalidArgument(format!(
                "slave address {slave} is reserved"
            )));
        }
        request.validate()?;

        let config = self.session.config();
        let max_attempts = config.max_attempts.max(1);
        let backoff = config.backoff;
        log::debug!(
            "Calling slave {slave} with function {}",
            request.function_code()
        );

        let mut attempt = 1;
        loop {
            match self.session.call(slave, request) {
                Ok(rsp) => return Ok(rsp),
                Err(err) if err.is_retryable() => {
                    if attempt >= max_attempts {
                        log::warn!(
                            "Giving up on slave {slave} after {attempt} attempts: {err}"
                        );
                        return Err(Error::CommunicationFailed {
                            attempts: attempt,
                            source: Box::new(err),
                        });
                    }
                    let delay = backoff.delay(attempt);
                    log::warn!(
                        "Attempt {attempt}/{max_attempts} to slave {slave} failed: {err}, \
                         retrying in {delay:?}"
                    );
                    self.session.clock().sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<T, C> SlaveContext for Master<T, C> {
    fn set_slave(&mut self, slave: Slave) {
        self.slave = slave;
    }
}

impl<T, C> Client for Master<T, C>
where
    T: Transport + Debug,
    C: Clock + Debug,
{
    fn call(&mut self, request: Request<'_>) -> Result<Response> {
        let slave = self.slave;
        self.call_slave(slave, &request)
    }
}
