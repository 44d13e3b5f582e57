// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU cyclic redundancy check

/// Reflected form of the CRC-16/MODBUS polynomial 0x8005.
const POLYNOMIAL: u16 = 0xA001;

/// Computes the CRC-16/MODBUS value of `buf`.
///
/// The low byte of the result is transmitted first.
#[must_use]
pub fn checksum(buf: &[u8]) -> u16 {
    let mut crc = 0xFFFF;
    for x in buf {
        crc ^= u16::from(*x);
        for _ in 0..8 {
            if (crc & 0x0001) != 0 {
                crc >>= 1;
                crc ^= POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        let msg = [0x01, 0x03, 0x08, 0x2B, 0x00, 0x02];
        assert_eq!(checksum(&msg).to_le_bytes(), [0xB6, 0x63]);

        let msg = [0x01, 0x03, 0x04, 0x00, 0x20, 0x00, 0x00];
        assert_eq!(checksum(&msg).to_le_bytes(), [0xFB, 0xF9]);

        let msg = [0x01, 0x03, 0x00, 0x00, 0x00, 0x01];
        assert_eq!(checksum(&msg), 0x0A84);
        assert_eq!(checksum(&msg).to_le_bytes(), [0x84, 0x0A]);
    }

    #[test]
    fn check_value() {
        // CRC-16/MODBUS catalogue check value
        assert_eq!(checksum(b"123456789"), 0x4B37);
    }

    #[test]
    fn empty_input_yields_initial_register() {
        assert_eq!(checksum(&[]), 0xFFFF);
    }

    #[test]
    fn order_sensitive() {
        let a = checksum(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]);
        let b = checksum(&[0x03, 0x01, 0x00, 0x00, 0x00, 0x01]);
        assert_ne!(a, b);
    }
}
