// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU master API

use std::{borrow::Cow, fmt::Debug};

use crate::{frame::*, slave::*, Error, Result};

pub mod rtu;

/// Transport independent client trait
pub trait Client: SlaveContext + Debug {
    /// Invokes a _Modbus_ function on the current slave.
    fn call(&mut self, request: Request<'_>) -> Result<Response>;
}

/// _Modbus_ reader
pub trait Reader: Client {
    /// Read multiple coils (0x01)
    fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;

    /// Read multiple discrete inputs (0x02)
    fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;

    /// Read multiple holding registers (0x03)
    fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;

    /// Read multiple input registers (0x04)
    fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;
}

/// _Modbus_ writer
///
/// All writes are acknowledged with `()` once the slave echoed them.
/// Broadcast writes are acknowledged right after transmission.
pub trait Writer: Client {
    /// Write a single coil (0x05)
    fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()>;

    /// Write a single holding register (0x06)
    fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()>;

    /// Write multiple coils (0x0F)
    fn write_multiple_coils(&mut self, addr: Address, coils: &[Coil]) -> Result<()>;

    /// Write multiple holding registers (0x10)
    fn write_multiple_registers(&mut self, addr: Address, words: &[Word]) -> Result<()>;
}

/// Modbus client context
#[derive(Debug)]
pub struct Context {
    client: Box<dyn Client>,
}

impl From<Box<dyn Client>> for Context {
    fn from(client: Box<dyn Client>) -> Self {
        Self { client }
    }
}

impl From<Context> for Box<dyn Client> {
    fn from(val: Context) -> Self {
        val.client
    }
}

impl Client for Context {
    fn call(&mut self, request: Request<'_>) -> Result<Response> {
        self.client.call(request)
    }
}

impl SlaveContext for Context {
    fn set_slave(&mut self, slave: Slave) {
        self.client.set_slave(slave);
    }
}

fn unexpected(response: &Response) -> Error {
    Error::MalformedResponse(format!(
        "unexpected response to function {}",
        response.function_code()
    ))
}

impl Reader for Context {
    fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        match self.client.call(Request::ReadCoils(addr, cnt))? {
            Response::ReadCoils(coils) => {
                debug_assert_eq!(coils.len(), cnt.into());
                Ok(coils)
            }
            rsp => Err(unexpected(&rsp)),
        }
    }

    fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        match self.client.call(Request::ReadDiscreteInputs(addr, cnt))? {
            Response::ReadDiscreteInputs(inputs) => {
                debug_assert_eq!(inputs.len(), cnt.into());
                Ok(inputs)
            }
            rsp => Err(unexpected(&rsp)),
        }
    }

    fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>> {
        match self.client.call(Request::ReadHoldingRegisters(addr, cnt))? {
            Response::ReadHoldingRegisters(words) => {
                debug_assert_eq!(words.len(), cnt.into());
                Ok(words)
            }
            rsp => Err(unexpected(&rsp)),
        }
    }

    fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>> {
        match self.client.call(Request::ReadInputRegisters(addr, cnt))? {
            Response::ReadInputRegisters(words) => {
                debug_assert_eq!(words.len(), cnt.into());
                Ok(words)
            }
            rsp => Err(unexpected(&rsp)),
        }
    }
}

impl Writer for Context {
    fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()> {
        match self.client.call(Request::WriteSingleCoil(addr, coil))? {
            Response::WriteSingleCoil(rsp_addr, rsp_coil) => {
                debug_assert_eq!(addr, rsp_addr);
                debug_assert_eq!(coil, rsp_coil);
                Ok(())
            }
            rsp => Err(unexpected(&rsp)),
        }
    }

    fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()> {
        match self.client.call(Request::WriteSingleRegister(addr, word))? {
            Response::WriteSingleRegister(rsp_addr, rsp_word) => {
                debug_assert_eq!(addr, rsp_addr);
                debug_assert_eq!(word, rsp_word);
                Ok(())
            }
            rsp => Err(unexpected(&rsp)),
        }
    }

    fn write_multiple_coils(&mut self, addr: Address, coils: &[Coil]) -> Result<()> {
        let cnt = coils.len();
        match self
            .client
            .call(Request::WriteMultipleCoils(addr, Cow::Borrowed(coils)))?
        {
            Response::WriteMultipleCoils(rsp_addr, rsp_cnt) => {
                debug_assert_eq!(addr, rsp_addr);
                debug_assert_eq!(cnt, rsp_cnt.into());
                Ok(())
            }
            rsp => Err(unexpected(&rsp)),
        }
    }

    fn write_multiple_registers(&mut self, addr: Address, words: &[Word]) -> Result<()> {
        let cnt = words.len();
        match self
            .client
            .call(Request::WriteMultipleRegisters(addr, Cow::Borrowed(words)))?
        {
            Response::WriteMultipleRegisters(rsp_addr, rsp_cnt) => {
                debug_assert_eq!(addr, rsp_addr);
                debug_assert_eq!(cnt, rsp_cnt.into());
                Ok(())
            }
            rsp => Err(unexpected(&rsp)),
        }
    }
}
