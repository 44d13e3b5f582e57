// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A pure [Rust](https://www.rust-lang.org)
//! [Modbus RTU](https://en.wikipedia.org/wiki/Modbus) master library.
//!
//! Modbus is based on a [master/slave](https://en.wikipedia.org/wiki/Master/slave_(technology))
//! model. This library implements the master side on a serial line:
//! it sends requests, enforces the bus timing and decodes the replies
//! of up to 247 slave devices.
//!
//! The API is blocking. A [`Transport`] moves the bytes and a [`Clock`]
//! measures the timeouts, so both the serial line and the time source
//! can be replaced.
//!
//! ## Installation
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! modbus-rtu-master = { version = "*", features = ["serial"] }
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "serial")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use modbus_rtu_master::prelude::*;
//!
//! let builder = tokio_serial::new("/dev/ttyUSB0", 19200);
//! let mut ctx = rtu::connect_slave(&builder, Slave(0x17), Config::default())?;
//! let rsp = ctx.read_holding_registers(0x082B, 2)?;
//! println!("Sensor value is: {rsp:?}");
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "serial"))]
//! # fn main() {}
//! ```

#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(unreachable_pub)]
#![warn(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub use bytes;

pub mod prelude;

pub mod client;

pub mod codec;

pub mod config;
pub use self::config::{Backoff, Config};

mod error;
pub use self::error::{Error, Result};

mod frame;
pub use self::frame::{rtu::Frame, *};

pub mod rtu;
pub use self::rtu::Session;

mod slave;
pub use self::slave::{Slave, SlaveContext, SlaveId};

pub mod transport;
pub use self::transport::{Clock, SystemClock, Transport};
