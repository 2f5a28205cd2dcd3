//! Modbus RTU framing rules
//!
//! Header plausibility rules used when scanning raw streams for RTU frames,
//! plus a request builder for synthetic captures.

use super::checksum;

/// Lowest unicast slave address
pub const MIN_SLAVE_ADDRESS: u8 = 1;
/// Highest unicast slave address
pub const MAX_SLAVE_ADDRESS: u8 = 247;
/// Smallest RTU frame: address, function, CRC
pub const MIN_RTU_FRAME: usize = 4;
/// Largest RTU frame
pub const MAX_RTU_FRAME: usize = 256;

/// Common Modbus function codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionCode {
    /// Read Coils (0x01)
    ReadCoils = 0x01,
    /// Read Discrete Inputs (0x02)
    ReadDiscreteInputs = 0x02,
    /// Read Holding Registers (0x03)
    ReadHoldingRegisters = 0x03,
    /// Read Input Registers (0x04)
    ReadInputRegisters = 0x04,
    /// Write Single Coil (0x05)
    WriteSingleCoil = 0x05,
    /// Write Single Register (0x06)
    WriteSingleRegister = 0x06,
}

/// Address is a unicast slave address (broadcast 0 excluded)
pub fn is_valid_address(address: u8) -> bool {
    (MIN_SLAVE_ADDRESS..=MAX_SLAVE_ADDRESS).contains(&address)
}

/// Function code is a request code or normal response (exception bit clear)
pub fn is_valid_function(function: u8) -> bool {
    (1..=127).contains(&function)
}

/// Header of `frame` looks like an RTU ADU
pub fn has_plausible_header(frame: &[u8]) -> bool {
    frame.len() >= 2 && is_valid_address(frame[0]) && is_valid_function(frame[1])
}

/// Build Modbus RTU request frame
pub fn build_rtu_request(slave_id: u8, function: FunctionCode, start_address: u16, quantity: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8);
    frame.push(slave_id);
    frame.push(function as u8);
    frame.extend_from_slice(&start_address.to_be_bytes());
    frame.extend_from_slice(&quantity.to_be_bytes());

    let crc = checksum::crc16_modbus(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rtu_request() {
        let frame = build_rtu_request(1, FunctionCode::ReadHoldingRegisters, 0, 1);
        assert_eq!(frame, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A]);
        assert!(has_plausible_header(&frame));
    }

    #[test]
    fn test_header_rules() {
        assert!(!is_valid_address(0));
        assert!(!is_valid_address(248));
        assert!(is_valid_function(0x10));
        assert!(!is_valid_function(0x83));
    }
}
