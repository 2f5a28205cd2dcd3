//! Protocol primitives
//!
//! Building blocks the analysis engine scores against:
//! - Checksum algorithms and the async checksum primitive
//! - Framing codecs (SLIP, delimiter-terminated)
//! - Modbus RTU header/CRC rules

pub mod checksum;
pub mod framing;
pub mod modbus;

pub use checksum::{
    resolve_byte_index, BatchMatch, ChecksumAlgorithm, ChecksumError, ChecksumPrimitive, CrcParams, CrcWidth,
    NativeChecksum,
};
pub use framing::{decode_slip, encode_slip, split_delimited};
pub use modbus::{build_rtu_request, FunctionCode};
