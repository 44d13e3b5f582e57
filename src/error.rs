// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.

use std::io;

use thiserror::Error;

use crate::{Address, ExceptionResponse};

/// Every fault a Modbus RTU exchange can end with.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller passed arguments outside the protocol bounds.
    ///
    /// Raised before anything is put on the wire.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A frame could not be built from the given fields.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Fewer bytes arrived than a complete frame requires.
    #[error("truncated frame: {received} bytes received, {expected} expected")]
    TruncatedFrame { received: usize, expected: usize },

    /// The received checksum does not match the frame contents.
    #[error("checksum mismatch: received 0x{received:04X}, calculated 0x{calculated:04X}")]
    Checksum { received: u16, calculated: u16 },

    /// The reply is well framed but does not fit the request.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Not a single byte arrived before the response timeout.
    #[error("no response")]
    NoResponse,

    /// A write was acknowledged with a different address or value.
    #[error(
        "write echo mismatch: expected ({expected_address}, 0x{expected_value:04X}), \
         received ({received_address}, 0x{received_value:04X})"
    )]
    WriteEchoMismatch {
        expected_address: Address,
        expected_value: u16,
        received_address: Address,
        received_value: u16,
    },

    /// The slave rejected the request with an exception response.
    #[error("exception: {0}")]
    Exception(ExceptionResponse),

    /// The function code is not part of the supported set.
    #[error("unsupported function code: 0x{0:02X}")]
    UnsupportedFunction(u8),

    /// A request is already awaiting its response on this session.
    #[error("session busy")]
    SessionBusy,

    /// The retry budget is exhausted.
    #[error("communication failed after {attempts} attempts: {source}")]
    CommunicationFailed {
        attempts: usize,
        #[source]
        source: Box<Error>,
    },

    /// The serial line reported an I/O failure.
    #[error(transparent)]
    Transport(#[from] io::Error),
}

impl Error {
    /// Faults the master recovers from by sending the request again.
    ///
    /// Only missing or corrupted replies qualify. A device that replied
    /// with a definitive outcome is never asked twice.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NoResponse | Self::Checksum { .. } | Self::TruncatedFrame { .. }
        )
    }

    /// The exception reported by the slave, if any.
    #[must_use]
    pub fn exception(&self) -> Option<&ExceptionResponse> {
        match self {
            Self::Exception(rsp) => Some(rsp),
            _ => None,
        }
    }
}

impl From<ExceptionResponse> for Error {
    fn from(from: ExceptionResponse) -> Self {
        Self::Exception(from)
    }
}

/// Specialized [`std::result::Result`] type for Modbus RTU operations.
pub type Result<T> = std::result::Result<T, Error>;
