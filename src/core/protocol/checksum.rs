//! Checksum primitives
//!
//! Bit-exact checksum and CRC computation used by the discovery engine:
//! - Fixed algorithm registry (XOR, Sum-8, CRC-8 family, CRC-16 family)
//! - Parameterised CRC-8 / CRC-16 for brute-force search
//! - Negative (from-end) byte index resolution
//! - The async [`ChecksumPrimitive`] boundary and its in-process implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Checksum algorithms in the fixed registry.
///
/// Registry order matters: it breaks ties in every ranked result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumAlgorithm {
    /// XOR of all bytes
    Xor,
    /// Sum of all bytes mod 256
    Sum8,
    /// CRC-8 (polynomial 0x07, SMBus)
    Crc8,
    /// CRC-8 SAE-J1850 (polynomial 0x1D, init 0xFF, xorout 0xFF)
    Crc8SaeJ1850,
    /// CRC-8 AUTOSAR (polynomial 0x2F, init 0xFF, xorout 0xFF)
    Crc8Autosar,
    /// CRC-8 Maxim (polynomial 0x31, reflected)
    Crc8Maxim,
    /// CRC-8 CDMA2000 (polynomial 0x9B, init 0xFF)
    Crc8Cdma2000,
    /// CRC-8 DVB-S2 (polynomial 0xD5)
    Crc8DvbS2,
    /// CRC-8 Nissan (polynomial 0x85)
    Crc8Nissan,
    /// CRC-16 Modbus (polynomial 0x8005, init 0xFFFF, reflected)
    Crc16Modbus,
    /// CRC-16 CCITT-FALSE (polynomial 0x1021, init 0xFFFF)
    Crc16Ccitt,
    /// CRC-16 XMODEM (polynomial 0x1021, init 0x0000)
    Crc16Xmodem,
    /// CRC-16 ARC / IBM (polynomial 0x8005, init 0x0000, reflected)
    Crc16Arc,
}

impl ChecksumAlgorithm {
    /// Every registry algorithm, in registry order
    pub fn all() -> &'static [ChecksumAlgorithm] {
        &[
            ChecksumAlgorithm::Xor,
            ChecksumAlgorithm::Sum8,
            ChecksumAlgorithm::Crc8,
            ChecksumAlgorithm::Crc8SaeJ1850,
            ChecksumAlgorithm::Crc8Autosar,
            ChecksumAlgorithm::Crc8Maxim,
            ChecksumAlgorithm::Crc8Cdma2000,
            ChecksumAlgorithm::Crc8DvbS2,
            ChecksumAlgorithm::Crc8Nissan,
            ChecksumAlgorithm::Crc16Modbus,
            ChecksumAlgorithm::Crc16Ccitt,
            ChecksumAlgorithm::Crc16Xmodem,
            ChecksumAlgorithm::Crc16Arc,
        ]
    }

    /// Stable identifier (matches the serde name)
    pub fn id(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Xor => "xor",
            ChecksumAlgorithm::Sum8 => "sum8",
            ChecksumAlgorithm::Crc8 => "crc8",
            ChecksumAlgorithm::Crc8SaeJ1850 => "crc8_sae_j1850",
            ChecksumAlgorithm::Crc8Autosar => "crc8_autosar",
            ChecksumAlgorithm::Crc8Maxim => "crc8_maxim",
            ChecksumAlgorithm::Crc8Cdma2000 => "crc8_cdma2000",
            ChecksumAlgorithm::Crc8DvbS2 => "crc8_dvb_s2",
            ChecksumAlgorithm::Crc8Nissan => "crc8_nissan",
            ChecksumAlgorithm::Crc16Modbus => "crc16_modbus",
            ChecksumAlgorithm::Crc16Ccitt => "crc16_ccitt",
            ChecksumAlgorithm::Crc16Xmodem => "crc16_xmodem",
            ChecksumAlgorithm::Crc16Arc => "crc16_arc",
        }
    }

    /// Parse an identifier produced by [`ChecksumAlgorithm::id`]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().iter().copied().find(|alg| alg.id() == id)
    }

    /// Output size in bytes
    pub fn width(&self) -> usize {
        match self {
            ChecksumAlgorithm::Crc16Modbus
            | ChecksumAlgorithm::Crc16Ccitt
            | ChecksumAlgorithm::Crc16Xmodem
            | ChecksumAlgorithm::Crc16Arc => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// CRC register width for parameterised search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrcWidth {
    /// 8-bit CRC
    Crc8,
    /// 16-bit CRC
    Crc16,
}

impl CrcWidth {
    /// Width in bits
    pub fn bits(&self) -> u8 {
        match self {
            CrcWidth::Crc8 => 8,
            CrcWidth::Crc16 => 16,
        }
    }
}

/// One parameterised CRC configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrcParams {
    /// Register width
    pub width: CrcWidth,
    /// Polynomial (normal, MSB-first notation)
    pub polynomial: u16,
    /// Initial register value
    pub init: u16,
    /// Final XOR value
    pub xor_out: u16,
    /// Reflected input and output
    pub reflect: bool,
}

impl CrcParams {
    /// Compute this CRC over `data`
    pub fn compute(&self, data: &[u8]) -> u16 {
        match self.width {
            CrcWidth::Crc8 => u16::from(crc8_parameterised(
                data,
                self.polynomial as u8,
                self.init as u8,
                self.xor_out as u8,
                self.reflect,
            )),
            CrcWidth::Crc16 => crc16_parameterised(
                data,
                self.polynomial,
                self.init,
                self.xor_out,
                self.reflect,
                self.reflect,
            ),
        }
    }
}

/// Match totals from a batch CRC test
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMatch {
    /// Payloads whose CRC equalled the expected value
    pub match_count: usize,
    /// Payloads tested
    pub total_count: usize,
}

/// Result of validating one frame's checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumValidation {
    /// Value read from the frame
    pub extracted: u16,
    /// Value computed over the data range
    pub calculated: u16,
    /// `extracted == calculated`
    pub valid: bool,
}

/// Checksum primitive errors
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    /// Payload and expected arrays differ in length
    #[error("Batch length mismatch: {payloads} payloads, {expected} expected values")]
    BatchMismatch {
        /// Payload count
        payloads: usize,
        /// Expected value count
        expected: usize,
    },

    /// Backend failure (e.g. an out-of-process primitive went away)
    #[error("Checksum backend failed: {0}")]
    Backend(String),
}

// ============ Byte index resolution ============

/// Resolve a byte index, counting negative values from the end.
///
/// `-1` is the last byte; indices reaching past the start clamp to 0.
pub fn resolve_byte_index(index: i32, frame_length: usize) -> usize {
    if index >= 0 {
        index as usize
    } else {
        frame_length.saturating_sub(index.unsigned_abs() as usize)
    }
}

// ============ Parameterised CRCs ============

fn reflect8(value: u8) -> u8 {
    value.reverse_bits()
}

fn reflect16(value: u16) -> u16 {
    value.reverse_bits()
}

/// CRC-8 with arbitrary parameters
pub fn crc8_parameterised(data: &[u8], polynomial: u8, init: u8, xor_out: u8, reflect: bool) -> u8 {
    let mut crc = init;

    if reflect {
        let poly = reflect8(polynomial);
        for &byte in data {
            crc ^= byte;
            for _ in 0..8 {
                if crc & 0x01 != 0 {
                    crc = (crc >> 1) ^ poly;
                } else {
                    crc >>= 1;
                }
            }
        }
    } else {
        for &byte in data {
            crc ^= byte;
            for _ in 0..8 {
                if crc & 0x80 != 0 {
                    crc = (crc << 1) ^ polynomial;
                } else {
                    crc <<= 1;
                }
            }
        }
    }

    crc ^ xor_out
}

/// CRC-16 with arbitrary parameters
///
/// With `reflect_in`, the register is shifted LSB-first using the reflected
/// polynomial, which already yields a reflected result.
pub fn crc16_parameterised(
    data: &[u8],
    polynomial: u16,
    init: u16,
    xor_out: u16,
    reflect_in: bool,
    reflect_out: bool,
) -> u16 {
    let mut crc = init;

    if reflect_in {
        let poly = reflect16(polynomial);
        for &byte in data {
            crc ^= u16::from(byte);
            for _ in 0..8 {
                if crc & 0x0001 != 0 {
                    crc = (crc >> 1) ^ poly;
                } else {
                    crc >>= 1;
                }
            }
        }
    } else {
        for &byte in data {
            crc ^= u16::from(byte) << 8;
            for _ in 0..8 {
                if crc & 0x8000 != 0 {
                    crc = (crc << 1) ^ polynomial;
                } else {
                    crc <<= 1;
                }
            }
        }
    }

    if reflect_in != reflect_out {
        crc = reflect16(crc);
    }

    crc ^ xor_out
}

// ============ Named checksums ============

/// XOR of all bytes
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Simple 8-bit sum
pub fn sum8_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// One step of the CRC-16/Modbus register (reflected 0x8005)
#[inline]
pub fn crc16_modbus_update(mut crc: u16, byte: u8) -> u16 {
    crc ^= u16::from(byte);
    for _ in 0..8 {
        if crc & 0x0001 != 0 {
            crc = (crc >> 1) ^ 0xA001;
        } else {
            crc >>= 1;
        }
    }
    crc
}

/// CRC-16/Modbus
/// Polynomial: 0x8005, Init: 0xFFFF, RefIn: true, RefOut: true, XorOut: 0x0000
pub fn crc16_modbus(data: &[u8]) -> u16 {
    data.iter().fold(0xFFFF, |crc, &b| crc16_modbus_update(crc, b))
}

/// Compute a registry algorithm over the whole of `data`
pub fn calculate_simple(algorithm: ChecksumAlgorithm, data: &[u8]) -> u16 {
    match algorithm {
        ChecksumAlgorithm::Xor => u16::from(xor_checksum(data)),
        ChecksumAlgorithm::Sum8 => u16::from(sum8_checksum(data)),
        ChecksumAlgorithm::Crc8 => u16::from(crc8_parameterised(data, 0x07, 0x00, 0x00, false)),
        ChecksumAlgorithm::Crc8SaeJ1850 => u16::from(crc8_parameterised(data, 0x1D, 0xFF, 0xFF, false)),
        ChecksumAlgorithm::Crc8Autosar => u16::from(crc8_parameterised(data, 0x2F, 0xFF, 0xFF, false)),
        ChecksumAlgorithm::Crc8Maxim => u16::from(crc8_parameterised(data, 0x31, 0x00, 0x00, true)),
        ChecksumAlgorithm::Crc8Cdma2000 => u16::from(crc8_parameterised(data, 0x9B, 0xFF, 0x00, false)),
        ChecksumAlgorithm::Crc8DvbS2 => u16::from(crc8_parameterised(data, 0xD5, 0x00, 0x00, false)),
        ChecksumAlgorithm::Crc8Nissan => u16::from(crc8_parameterised(data, 0x85, 0x00, 0x00, false)),
        ChecksumAlgorithm::Crc16Modbus => crc16_modbus(data),
        ChecksumAlgorithm::Crc16Ccitt => crc16_parameterised(data, 0x1021, 0xFFFF, 0x0000, false, false),
        ChecksumAlgorithm::Crc16Xmodem => crc16_parameterised(data, 0x1021, 0x0000, 0x0000, false, false),
        ChecksumAlgorithm::Crc16Arc => crc16_parameterised(data, 0x8005, 0x0000, 0x0000, true, true),
    }
}

/// Compute a registry algorithm over `data[start..end]` (negative indices from the end).
///
/// An empty or inverted range yields 0.
pub fn calculate_checksum(algorithm: ChecksumAlgorithm, data: &[u8], start: i32, end: i32) -> u16 {
    let len = data.len();
    let start = resolve_byte_index(start, len).min(len);
    let end = resolve_byte_index(end, len).min(len);

    if start >= end {
        return 0;
    }

    calculate_simple(algorithm, &data[start..end])
}

/// Read a 1- or 2-byte checksum stored at `position`.
///
/// Returns `None` when the field does not fit inside the frame.
pub fn extract_checksum(data: &[u8], position: i32, byte_len: usize, big_endian: bool) -> Option<u16> {
    let start = resolve_byte_index(position, data.len());
    let field = data.get(start..start.checked_add(byte_len)?)?;

    match field {
        [b] => Some(u16::from(*b)),
        [a, b] if big_endian => Some(u16::from_be_bytes([*a, *b])),
        [a, b] => Some(u16::from_le_bytes([*a, *b])),
        _ => None,
    }
}

/// Validate the checksum stored in a frame
pub fn validate_checksum(
    algorithm: ChecksumAlgorithm,
    data: &[u8],
    position: i32,
    big_endian: bool,
    calc_start: i32,
    calc_end: i32,
) -> Option<ChecksumValidation> {
    let extracted = extract_checksum(data, position, algorithm.width(), big_endian)?;
    let calculated = calculate_checksum(algorithm, data, calc_start, calc_end);

    Some(ChecksumValidation {
        extracted,
        calculated,
        valid: extracted == calculated,
    })
}

/// Test one CRC configuration against parallel payload / expected arrays
pub fn batch_test_crc(payloads: &[Vec<u8>], expected: &[u16], params: CrcParams) -> BatchMatch {
    let total_count = payloads.len().min(expected.len());
    let match_count = payloads
        .iter()
        .zip(expected)
        .filter(|(payload, &want)| params.compute(payload) == want)
        .count();

    BatchMatch {
        match_count,
        total_count,
    }
}

// ============ Primitive boundary ============

/// Bit-exact, side-effect-free checksum backend.
///
/// Every call is an await point so an out-of-process backend can be
/// substituted without touching the engine.
#[async_trait]
pub trait ChecksumPrimitive: Send + Sync {
    /// Compute a registry algorithm over `data[range_start..range_end]`
    async fn compute(
        &self,
        algorithm: ChecksumAlgorithm,
        data: &[u8],
        range_start: i32,
        range_end: i32,
    ) -> Result<u16, ChecksumError>;

    /// Test one payload against one CRC configuration
    async fn test_crc(&self, payload: &[u8], expected: u16, params: CrcParams) -> Result<bool, ChecksumError>;

    /// Test many payloads against one CRC configuration
    async fn test_crc_batch(
        &self,
        payloads: &[Vec<u8>],
        expected: &[u16],
        params: CrcParams,
    ) -> Result<BatchMatch, ChecksumError>;
}

/// In-process checksum backend
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeChecksum;

impl NativeChecksum {
    /// Create a new native backend
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChecksumPrimitive for NativeChecksum {
    async fn compute(
        &self,
        algorithm: ChecksumAlgorithm,
        data: &[u8],
        range_start: i32,
        range_end: i32,
    ) -> Result<u16, ChecksumError> {
        Ok(calculate_checksum(algorithm, data, range_start, range_end))
    }

    async fn test_crc(&self, payload: &[u8], expected: u16, params: CrcParams) -> Result<bool, ChecksumError> {
        Ok(params.compute(payload) == expected)
    }

    async fn test_crc_batch(
        &self,
        payloads: &[Vec<u8>],
        expected: &[u16],
        params: CrcParams,
    ) -> Result<BatchMatch, ChecksumError> {
        if payloads.len() != expected.len() {
            return Err(ChecksumError::BatchMismatch {
                payloads: payloads.len(),
                expected: expected.len(),
            });
        }
        Ok(batch_test_crc(payloads, expected, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECK: &[u8] = b"123456789";

    #[test]
    fn test_resolve_byte_index() {
        assert_eq!(resolve_byte_index(0, 10), 0);
        assert_eq!(resolve_byte_index(5, 10), 5);
        assert_eq!(resolve_byte_index(-1, 10), 9);
        assert_eq!(resolve_byte_index(-2, 10), 8);
        assert_eq!(resolve_byte_index(-10, 10), 0);
        assert_eq!(resolve_byte_index(-11, 10), 0);
    }

    #[test]
    fn test_xor_and_sum8() {
        assert_eq!(xor_checksum(&[0x01, 0x02, 0x03]), 0x00);
        assert_eq!(xor_checksum(&[0xAA, 0x55]), 0xFF);
        assert_eq!(sum8_checksum(&[0x01, 0x02, 0x03]), 0x06);
        assert_eq!(sum8_checksum(&[0xFF, 0x02]), 0x01);
    }

    #[test]
    fn test_crc8_catalogue_vectors() {
        assert_eq!(calculate_simple(ChecksumAlgorithm::Crc8, CHECK), 0xF4);
        assert_eq!(calculate_simple(ChecksumAlgorithm::Crc8SaeJ1850, CHECK), 0x4B);
        assert_eq!(calculate_simple(ChecksumAlgorithm::Crc8Autosar, CHECK), 0xDF);
        assert_eq!(calculate_simple(ChecksumAlgorithm::Crc8Maxim, CHECK), 0xA1);
        assert_eq!(calculate_simple(ChecksumAlgorithm::Crc8Cdma2000, CHECK), 0xDA);
        assert_eq!(calculate_simple(ChecksumAlgorithm::Crc8DvbS2, CHECK), 0xBC);
    }

    #[test]
    fn test_crc16_catalogue_vectors() {
        assert_eq!(calculate_simple(ChecksumAlgorithm::Crc16Modbus, CHECK), 0x4B37);
        assert_eq!(calculate_simple(ChecksumAlgorithm::Crc16Ccitt, CHECK), 0x29B1);
        assert_eq!(calculate_simple(ChecksumAlgorithm::Crc16Xmodem, CHECK), 0x31C3);
        assert_eq!(calculate_simple(ChecksumAlgorithm::Crc16Arc, CHECK), 0xBB3D);
    }

    #[test]
    fn test_crc16_modbus_request() {
        let data = [0x01, 0x03, 0x00, 0x00, 0x00, 0x01];
        assert_eq!(crc16_modbus(&data).to_le_bytes(), [0x84, 0x0A]);
    }

    #[test]
    fn test_registry_ids_roundtrip() {
        for alg in ChecksumAlgorithm::all() {
            assert_eq!(ChecksumAlgorithm::from_id(alg.id()), Some(*alg));
        }
        assert_eq!(ChecksumAlgorithm::from_id("md5"), None);
    }

    #[test]
    fn test_calculate_checksum_range() {
        let frame = [0x55u8, 0x01, 0x02, 0x03, 0x00];
        assert_eq!(calculate_checksum(ChecksumAlgorithm::Sum8, &frame, 1, 4), 0x06);
        assert_eq!(calculate_checksum(ChecksumAlgorithm::Sum8, &frame, 0, -1), 0x5B);
        assert_eq!(calculate_checksum(ChecksumAlgorithm::Sum8, &frame, 4, 2), 0);
    }

    #[test]
    fn test_extract_checksum() {
        let data = [0x01, 0x02, 0xAB, 0xCD];
        assert_eq!(extract_checksum(&data, -1, 1, false), Some(0xCD));
        assert_eq!(extract_checksum(&data, -2, 2, true), Some(0xABCD));
        assert_eq!(extract_checksum(&data, -2, 2, false), Some(0xCDAB));
        assert_eq!(extract_checksum(&data, -1, 2, false), None);
        assert_eq!(extract_checksum(&data, 7, 1, false), None);
    }

    #[test]
    fn test_validate_checksum_modbus() {
        let mut frame = vec![0x01u8, 0x03, 0x00, 0x00, 0x00, 0x0A];
        let crc = crc16_modbus(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());

        let result = validate_checksum(ChecksumAlgorithm::Crc16Modbus, &frame, -2, false, 0, -2).unwrap();
        assert!(result.valid);
        assert_eq!(result.extracted, 0xCDC5);
    }

    #[test]
    fn test_parameterised_matches_registry() {
        let params = CrcParams {
            width: CrcWidth::Crc8,
            polynomial: 0x1D,
            init: 0xFF,
            xor_out: 0xFF,
            reflect: false,
        };
        assert_eq!(params.compute(CHECK), 0x4B);

        let params = CrcParams {
            width: CrcWidth::Crc16,
            polynomial: 0x8005,
            init: 0xFFFF,
            xor_out: 0,
            reflect: true,
        };
        assert_eq!(params.compute(CHECK), 0x4B37);
    }

    #[tokio::test]
    async fn test_native_batch_counts() {
        let payloads = vec![b"abc".to_vec(), b"def".to_vec(), b"ghi".to_vec()];
        let params = CrcParams {
            width: CrcWidth::Crc8,
            polynomial: 0x07,
            init: 0,
            xor_out: 0,
            reflect: false,
        };
        let mut expected: Vec<u16> = payloads.iter().map(|p| params.compute(p)).collect();
        expected[2] ^= 0x01;

        let native = NativeChecksum::new();
        let result = native.test_crc_batch(&payloads, &expected, params).await.unwrap();
        assert_eq!(result, BatchMatch { match_count: 2, total_count: 3 });

        let err = native.test_crc_batch(&payloads, &expected[..1], params).await;
        assert!(matches!(err, Err(ChecksumError::BatchMismatch { .. })));
    }
}
