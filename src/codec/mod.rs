// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-function encoding of request payloads and decoding of response payloads.

use std::io::{self, Cursor};

use byteorder::{BigEndian, ReadBytesExt as _};

use crate::{
    bytes::{BufMut as _, Bytes, BytesMut},
    frame::{rtu::EXCEPTION_FLAG, Address, Coil, Quantity, Word},
    Error, ExceptionCode, ExceptionResponse, FunctionCode, Request, Response, Result,
};

pub mod crc;
pub mod rtu;

#[allow(clippy::cast_possible_truncation)]
fn u16_len(len: usize) -> u16 {
    // This type conversion should always be safe, because
    // the request has been validated against the protocol limits.
    debug_assert!(len <= u16::MAX.into());
    len as u16
}

#[allow(clippy::cast_possible_truncation)]
fn u8_len(len: usize) -> u8 {
    // This type conversion should always be safe, because
    // the request has been validated against the protocol limits.
    debug_assert!(len <= u8::MAX.into());
    len as u8
}

/// Encodes the payload of `request`, i.e. everything following the
/// function code.
///
/// # Errors
///
/// [`Error::InvalidArgument`] if the request violates the protocol limits.
pub fn encode_request(request: &Request<'_>) -> Result<Bytes> {
    use crate::frame::Request::*;

    request.validate()?;
    let mut buf = BytesMut::with_capacity(request_payload_size(request));
    match request {
        ReadCoils(address, quantity)
        | ReadDiscreteInputs(address, quantity)
        | ReadInputRegisters(address, quantity)
        | ReadHoldingRegisters(address, quantity) => {
            buf.put_u16(*address);
            buf.put_u16(*quantity);
        }
        WriteSingleCoil(address, state) => {
            buf.put_u16(*address);
            buf.put_u16(bool_to_coil(*state));
        }
        WriteMultipleCoils(address, coils) => {
            buf.put_u16(*address);
            buf.put_u16(u16_len(coils.len()));
            buf.put_u8(u8_len(packed_coils_size(coils)));
            encode_packed_coils(&mut buf, coils);
        }
        WriteSingleRegister(address, word) => {
            buf.put_u16(*address);
            buf.put_u16(*word);
        }
        WriteMultipleRegisters(address, words) => {
            buf.put_u16(*address);
            let len = words.len();
            buf.put_u16(u16_len(len));
            buf.put_u8(u8_len(len * 2));
            for w in words.as_ref() {
                buf.put_u16(*w);
            }
        }
    }
    Ok(buf.freeze())
}

/// Decodes the reply to `request` from its raw function byte and payload.
///
/// # Errors
///
/// - [`Error::Exception`] if the slave answered with an exception response.
/// - [`Error::UnsupportedFunction`] if the function byte is unknown.
/// - [`Error::MalformedResponse`] if the reply doesn't fit the request.
/// - [`Error::WriteEchoMismatch`] if a write echo differs from the request.
pub fn decode_response(request: &Request<'_>, function: u8, payload: &[u8]) -> Result<Response> {
    use crate::frame::Request::*;

    let expected = request.function_code();
    let received = FunctionCode::try_from(function & !EXCEPTION_FLAG)?;
    if received != expected {
        return Err(Error::MalformedResponse(format!(
            "function code mismatch: request = {expected}, response = {received}"
        )));
    }
    if function & EXCEPTION_FLAG != 0 {
        return Err(decode_exception(expected, payload));
    }

    let rsp = match request {
        ReadCoils(_, quantity) => Response::ReadCoils(decode_bits(payload, *quantity)?),
        ReadDiscreteInputs(_, quantity) => {
            Response::ReadDiscreteInputs(decode_bits(payload, *quantity)?)
        }
        ReadInputRegisters(_, quantity) => {
            Response::ReadInputRegisters(decode_words(payload, *quantity)?)
        }
        ReadHoldingRegisters(_, quantity) => {
            Response::ReadHoldingRegisters(decode_words(payload, *quantity)?)
        }
        WriteSingleCoil(address, state) => {
            verify_echo(payload, *address, bool_to_coil(*state))?;
            Response::WriteSingleCoil(*address, *state)
        }
        WriteSingleRegister(address, word) => {
            verify_echo(payload, *address, *word)?;
            Response::WriteSingleRegister(*address, *word)
        }
        WriteMultipleCoils(address, coils) => {
            let quantity = u16_len(coils.len());
            verify_echo(payload, *address, quantity)?;
            Response::WriteMultipleCoils(*address, quantity)
        }
        WriteMultipleRegisters(address, words) => {
            let quantity = u16_len(words.len());
            verify_echo(payload, *address, quantity)?;
            Response::WriteMultipleRegisters(*address, quantity)
        }
    };
    Ok(rsp)
}

/// The response a write request is assumed to have produced when no
/// reply is expected, i.e. for broadcasts.
pub(crate) fn assumed_write_response(request: &Request<'_>) -> Result<Response> {
    use crate::frame::Request::*;

    let rsp = match request {
        WriteSingleCoil(address, state) => Response::WriteSingleCoil(*address, *state),
        WriteSingleRegister(address, word) => Response::WriteSingleRegister(*address, *word),
        WriteMultipleCoils(address, coils) => {
            Response::WriteMultipleCoils(*address, u16_len(coils.len()))
        }
        WriteMultipleRegisters(address, words) => {
            Response::WriteMultipleRegisters(*address, u16_len(words.len()))
        }
        ReadCoils(_, _)
        | ReadDiscreteInputs(_, _)
        | ReadInputRegisters(_, _)
        | ReadHoldingRegisters(_, _) => {
            return Err(Error::InvalidArgument(format!(
                "function {} cannot be broadcast",
                request.function_code()
            )));
        }
    };
    Ok(rsp)
}

fn decode_exception(function: FunctionCode, payload: &[u8]) -> Error {
    match payload {
        [code] => Error::Exception(ExceptionResponse {
            function,
            exception: ExceptionCode::new(*code),
        }),
        _ => Error::MalformedResponse(format!(
            "exception response with {} payload bytes",
            payload.len()
        )),
    }
}

/// Splits a read response into its data bytes after checking the
/// leading byte count against the expected one.
fn read_data(payload: &[u8], expected_byte_count: usize) -> Result<&[u8]> {
    let Some((&byte_count, data)) = payload.split_first() else {
        return Err(Error::MalformedResponse("missing byte count".to_owned()));
    };
    if usize::from(byte_count) != expected_byte_count {
        return Err(Error::MalformedResponse(format!(
            "byte count mismatch: expected = {expected_byte_count}, actual = {byte_count}"
        )));
    }
    if data.len() != expected_byte_count {
        return Err(Error::MalformedResponse(format!(
            "data length mismatch: byte count = {byte_count}, received = {}",
            data.len()
        )));
    }
    Ok(data)
}

fn decode_bits(payload: &[u8], quantity: Quantity) -> Result<Vec<Coil>> {
    let data = read_data(payload, packed_size(quantity.into()))?;
    Ok(decode_packed_coils(data, quantity))
}

fn decode_words(payload: &[u8], quantity: Quantity) -> Result<Vec<Word>> {
    let data = read_data(payload, usize::from(quantity) * 2)?;
    let rdr = &mut Cursor::new(data);
    let mut words = Vec::with_capacity(quantity.into());
    for _ in 0..quantity {
        words.push(read_u16_be(rdr)?);
    }
    Ok(words)
}

fn verify_echo(payload: &[u8], address: Address, value: u16) -> Result<()> {
    if payload.len() != 4 {
        return Err(Error::MalformedResponse(format!(
            "write echo with {} payload bytes",
            payload.len()
        )));
    }
    let rdr = &mut Cursor::new(payload);
    let received_address = read_u16_be(rdr)?;
    let received_value = read_u16_be(rdr)?;
    if (received_address, received_value) != (address, value) {
        return Err(Error::WriteEchoMismatch {
            expected_address: address,
            expected_value: value,
            received_address,
            received_value,
        });
    }
    Ok(())
}

fn read_u16_be(reader: &mut impl io::Read) -> io::Result<u16> {
    reader.read_u16::<BigEndian>()
}

fn bool_to_coil(state: bool) -> u16 {
    if state {
        0xFF00
    } else {
        0x0000
    }
}

fn packed_size(bits: usize) -> usize {
    (bits + 7) / 8
}

fn packed_coils_size(coils: &[Coil]) -> usize {
    packed_size(coils.len())
}

fn encode_packed_coils(buf: &mut BytesMut, coils: &[Coil]) -> usize {
    let packed_coils_size = packed_coils_size(coils);
    let offset = buf.len();
    buf.resize(offset + packed_coils_size, 0);
    let buf = &mut buf[offset..];
    for (i, b) in coils.iter().enumerate() {
        let v = u8::from(*b); // 0 or 1
        buf[i / 8] |= v << (i % 8);
    }
    packed_coils_size
}

fn decode_packed_coils(bytes: &[u8], count: u16) -> Vec<Coil> {
    let mut res = Vec::with_capacity(count.into());
    for i in 0usize..count.into() {
        res.push((bytes[i / 8] >> (i % 8)) & 0b1 > 0);
    }
    res
}

fn request_payload_size(request: &Request<'_>) -> usize {
    use crate::frame::Request::*;

    match request {
        ReadCoils(_, _)
        | ReadDiscreteInputs(_, _)
        | ReadInputRegisters(_, _)
        | ReadHoldingRegisters(_, _)
        | WriteSingleRegister(_, _)
        | WriteSingleCoil(_, _) => 4,
        WriteMultipleCoils(_, coils) => 5 + packed_coils_size(coils),
        WriteMultipleRegisters(_, words) => 5 + words.len() * 2,
    }
}
