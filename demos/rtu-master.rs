// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RTU master example

use std::time::Duration;

fn main() -> anyhow::Result<()> {
    use modbus_rtu_master::prelude::*;

    env_logger::init();

    let tty_path = "/dev/ttyUSB0";
    let slave = Slave(0x17);

    let builder = tokio_serial::new(tty_path, 19200);
    let config = Config::default()
        .with_response_timeout(Duration::from_millis(500))
        .with_backoff(Backoff::Exponential {
            initial: Duration::from_millis(50),
            max: Duration::from_millis(400),
        });

    let mut ctx = rtu::connect_slave(&builder, slave, config)?;
    println!("Reading a sensor value");
    let rsp = ctx.read_holding_registers(0x082B, 2)?;
    println!("Sensor value is: {rsp:?}");

    println!("Switching all relays off");
    ctx.set_slave(Slave::broadcast());
    ctx.write_multiple_coils(0x0000, &[false; 8])?;

    Ok(())
}
