// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RTU framing: address, function code, payload and trailing checksum.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt as _};

use crate::{
    bytes::{BufMut as _, Bytes, BytesMut},
    frame::rtu::{Frame, EXCEPTION_FLAG},
    Error, FunctionCode, Result, Slave,
};

use super::crc::checksum;

/// addr + function + crc
pub const MIN_ADU_LEN: usize = 1 + 1 + 2;

/// Largest payload that still fits the 256 byte serial ADU.
pub const MAX_PAYLOAD_LEN: usize = 252;

pub const MAX_ADU_LEN: usize = MIN_ADU_LEN + MAX_PAYLOAD_LEN;

const CRC_LEN: usize = 2;

/// Builds a complete RTU frame with the checksum appended low byte first.
///
/// # Errors
///
/// [`Error::Encoding`] if `slave` is a reserved address or `payload`
/// exceeds [`MAX_PAYLOAD_LEN`].
pub fn encode(slave: Slave, function: FunctionCode, payload: &[u8]) -> Result<Bytes> {
    if slave.is_reserved() {
        return Err(Error::Encoding(format!("reserved slave address {slave}")));
    }
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(Error::Encoding(format!(
            "payload of {} bytes exceeds {MAX_PAYLOAD_LEN} bytes",
            payload.len()
        )));
    }
    let mut buf = BytesMut::with_capacity(MIN_ADU_LEN + payload.len());
    buf.put_u8(slave.into());
    buf.put_u8(function.value());
    buf.put_slice(payload);
    let crc = checksum(&buf);
    buf.put_u16_le(crc);
    Ok(buf.freeze())
}

/// Parses and verifies a raw RTU frame.
///
/// # Errors
///
/// [`Error::TruncatedFrame`] if `buf` is shorter than [`MIN_ADU_LEN`],
/// [`Error::Checksum`] if the trailing checksum doesn't match.
pub fn decode(buf: &[u8]) -> Result<Frame> {
    if buf.len() < MIN_ADU_LEN {
        return Err(Error::TruncatedFrame {
            received: buf.len(),
            expected: MIN_ADU_LEN,
        });
    }
    let (adu, crc) = buf.split_at(buf.len() - CRC_LEN);
    let received = Cursor::new(crc).read_u16::<LittleEndian>()?;
    let calculated = checksum(adu);
    if received != calculated {
        return Err(Error::Checksum {
            received,
            calculated,
        });
    }
    Ok(Frame {
        slave: adu[0],
        function: adu[1],
        payload: Bytes::copy_from_slice(&adu[2..]),
    })
}

/// Total length of the response frame that starts with `buf`.
///
/// Returns `None` while the header needed to determine the length is
/// still incomplete, or if the function code is unknown.
#[must_use]
pub fn response_frame_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < 2 {
        // incomplete frame
        return None;
    }
    let payload_len = match buf[1] {
        function if function & EXCEPTION_FLAG != 0 => 1,
        0x01..=0x04 => 1 + usize::from(*buf.get(2)?),
        0x05 | 0x06 | 0x0F | 0x10 => 4,
        _ => return None,
    };
    Some(MIN_ADU_LEN + payload_len)
}
