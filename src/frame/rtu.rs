// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use bytes::Bytes;

use crate::slave::SlaveId;

/// Bit set in the function code of an exception response.
pub(crate) const EXCEPTION_FLAG: u8 = 0x80;

/// A decoded RTU application data unit without its checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Address byte as found on the wire.
    pub slave: SlaveId,
    /// Raw function byte, possibly with [`EXCEPTION_FLAG`] set.
    pub function: u8,
    /// Everything between the function byte and the checksum.
    pub payload: Bytes,
}

impl Frame {
    #[must_use]
    pub fn is_exception(&self) -> bool {
        self.function & EXCEPTION_FLAG != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_flag() {
        let frame = Frame {
            slave: 1,
            function: 0x83,
            payload: Bytes::from_static(&[0x02]),
        };
        assert!(frame.is_exception());

        let frame = Frame {
            slave: 1,
            function: 0x03,
            payload: Bytes::new(),
        };
        assert!(!frame.is_exception());
    }
}
