//! Capture file loading
//!
//! Supports:
//! - candump log format: `(1436509052.249713) can0 123#DEADBEEF`
//! - Raw binary streams
//! - Hex text streams (whitespace ignored)

use std::path::Path;

use crate::core::analysis::Frame;

/// Capture loading error
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// File could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },
    /// Malformed capture line
    #[error("Line {line}: {reason}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What was wrong
        reason: String,
    },
    /// Malformed hex stream
    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Result alias for capture loading
pub type Result<T> = std::result::Result<T, CaptureError>;

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| CaptureError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Parse candump log text. Blank lines and `#` comments are skipped.
///
/// Interfaces are numbered as bus 0, 1, ... in order of first appearance.
pub fn parse_candump(text: &str) -> Result<Vec<Frame>> {
    let mut interfaces: Vec<String> = Vec::new();
    let mut frames = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parse_err = |reason: &str| CaptureError::Parse {
            line: index + 1,
            reason: reason.to_string(),
        };

        let mut fields = line.split_whitespace();
        let (Some(stamp), Some(interface), Some(body)) = (fields.next(), fields.next(), fields.next()) else {
            return Err(parse_err("expected `(timestamp) interface id#data`"));
        };

        let timestamp_us = parse_timestamp(stamp).ok_or_else(|| parse_err("bad timestamp"))?;

        let (id_text, data_text) = body.split_once('#').ok_or_else(|| parse_err("missing `#`"))?;
        let id = u32::from_str_radix(id_text, 16).map_err(|_| parse_err("bad frame id"))?;

        let bytes = match data_text.strip_prefix('#') {
            // CAN FD: one flags nibble ahead of the data
            Some(fd) => hex::decode(fd.get(1..).unwrap_or("")),
            None if data_text.starts_with('R') => Ok(Vec::new()),
            None => hex::decode(data_text),
        }
        .map_err(|_| parse_err("bad payload hex"))?;

        let bus = match interfaces.iter().position(|name| name == interface) {
            Some(position) => position,
            None => {
                interfaces.push(interface.to_string());
                interfaces.len() - 1
            }
        };

        frames.push(Frame::new(id, timestamp_us, bytes).on_bus(bus.min(u8::MAX as usize) as u8));
    }

    tracing::debug!(frames = frames.len(), interfaces = interfaces.len(), "candump parsed");
    Ok(frames)
}

/// `(secs.usecs)` to microseconds
fn parse_timestamp(stamp: &str) -> Option<u64> {
    let inner = stamp.strip_prefix('(')?.strip_suffix(')')?;
    let (secs, frac) = inner.split_once('.').unwrap_or((inner, "0"));
    let secs: u64 = secs.parse().ok()?;

    // Normalise the fraction to six digits
    let mut digits: String = frac.chars().take(6).collect();
    while digits.len() < 6 {
        digits.push('0');
    }
    let micros: u64 = digits.parse().ok()?;

    secs.checked_mul(1_000_000)?.checked_add(micros)
}

/// Load a candump log file
pub fn read_capture(path: impl AsRef<Path>) -> Result<Vec<Frame>> {
    let path = path.as_ref();
    let content = read_file(path)?;
    parse_candump(&String::from_utf8_lossy(&content))
}

/// Load a raw binary stream
pub fn read_raw(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    read_file(path.as_ref())
}

/// Parse a hex text stream such as `C0 01 02 C0`
pub fn parse_hex_stream(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(hex::decode(compact)?)
}

/// Load a hex text stream
pub fn read_hex(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let content = read_file(path.as_ref())?;
    parse_hex_stream(&String::from_utf8_lossy(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_candump() {
        let log = "\
(1436509052.249713) vcan0 123#DEADBEEF
# comment
(1436509052.449847) vcan1 18DAF110#0201
(1436509052.650004) vcan0 7DF#R
";
        let frames = parse_candump(log).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].id, 0x123);
        assert_eq!(frames[0].bytes, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(frames[0].timestamp_us, 1_436_509_052_249_713);
        assert_eq!(frames[1].id, 0x18DA_F110);
        assert_eq!(frames[1].bus, 1);
        assert!(frames[2].bytes.is_empty());
        assert_eq!(frames[2].bus, 0);
    }

    #[test]
    fn test_parse_candump_fd() {
        let frames = parse_candump("(1.5) can0 42##1AABBCC").unwrap();
        assert_eq!(frames[0].bytes, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(frames[0].timestamp_us, 1_500_000);
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let err = parse_candump("(1.0) can0 123#00\n(2.0) can0 XYZ#00").unwrap_err();
        match err {
            CaptureError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other}"),
        }
        assert!(parse_candump("garbage").is_err());
    }

    #[test]
    fn test_hex_stream() {
        assert_eq!(parse_hex_stream("C0 01\n02 c0").unwrap(), vec![0xC0, 1, 2, 0xC0]);
        assert!(parse_hex_stream("C0 1").is_err());
    }

    #[test]
    fn test_read_files() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("capture.log");
        let mut file = std::fs::File::create(&log_path).unwrap();
        writeln!(file, "(10.000001) can0 100#0102").unwrap();
        drop(file);

        let frames = read_capture(&log_path).unwrap();
        assert_eq!(frames[0].timestamp_us, 10_000_001);

        let raw_path = dir.path().join("stream.bin");
        std::fs::write(&raw_path, [0xC0, 0x01, 0xC0]).unwrap();
        assert_eq!(read_raw(&raw_path).unwrap(), vec![0xC0, 0x01, 0xC0]);

        assert!(matches!(read_raw(dir.path().join("missing")), Err(CaptureError::Io { .. })));
    }
}
