//! Stream framing inference
//!
//! Scores a raw byte stream against three framing hypotheses:
//! - SLIP (RFC 1055)
//! - Modbus RTU (CRC-terminated ADUs)
//! - Delimiter-terminated (CRLF, LF, CR, NUL, ETX, EOT)
//!
//! Every hypothesis that clears its minimum confidence is returned, best first.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::core::protocol::checksum::crc16_modbus_update;
use crate::core::protocol::framing::{decode_slip, split_delimited, SLIP_END};
use crate::core::protocol::modbus::{has_plausible_header, MAX_RTU_FRAME, MIN_RTU_FRAME};

const SAMPLE_FRAMES: usize = 5;

const SLIP_MIN_CONFIDENCE: i32 = 20;
const MODBUS_MIN_CONFIDENCE: i32 = 30;
const DELIMITER_MIN_CONFIDENCE: i32 = 25;

/// Delimiters tried, in reporting order
const DELIMITERS: [(&str, &[u8], bool); 6] = [
    ("CRLF", b"\r\n", true),
    ("LF", b"\n", true),
    ("CR", b"\r", true),
    ("NUL", &[0x00], false),
    ("ETX", &[0x03], false),
    ("EOT", &[0x04], false),
];

/// Framing hypothesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingMode {
    /// SLIP, RFC 1055
    Slip,
    /// Modbus RTU
    ModbusRtu,
    /// Delimiter-terminated
    Delimiter,
}

impl std::fmt::Display for FramingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FramingMode::Slip => write!(f, "slip"),
            FramingMode::ModbusRtu => write!(f, "modbus_rtu"),
            FramingMode::Delimiter => write!(f, "delimiter"),
        }
    }
}

/// One scored hypothesis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FramingCandidate {
    /// Hypothesis
    pub mode: FramingMode,
    /// 0..=100
    pub confidence: u8,
    /// Delimiter bytes (delimiter mode)
    pub delimiter: Option<Vec<u8>>,
    /// Delimiter name (delimiter mode)
    pub delimiter_name: Option<String>,
    /// Frames found
    pub estimated_frame_count: usize,
    /// Mean frame length
    pub avg_frame_length: f64,
    /// Shortest frame
    pub min_frame_length: usize,
    /// Longest frame
    pub max_frame_length: usize,
    /// First few frames
    pub sample_frames: Vec<Vec<u8>>,
}

impl FramingCandidate {
    fn from_frames(mode: FramingMode, confidence: i32, frames: &[Vec<u8>]) -> Self {
        let lengths = FrameLengths::of(frames);
        Self {
            mode,
            confidence: confidence.clamp(0, 100) as u8,
            delimiter: None,
            delimiter_name: None,
            estimated_frame_count: frames.len(),
            avg_frame_length: lengths.avg,
            min_frame_length: lengths.min,
            max_frame_length: lengths.max,
            sample_frames: frames.iter().take(SAMPLE_FRAMES).cloned().collect(),
        }
    }
}

/// Detection output
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FramingResult {
    /// Accepted hypotheses, highest confidence first
    pub candidates: Vec<FramingCandidate>,
    /// Highest-confidence hypothesis
    pub best: Option<FramingCandidate>,
    /// Human-readable verdict
    pub note: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct FrameLengths {
    avg: f64,
    min: usize,
    max: usize,
}

impl FrameLengths {
    fn of(frames: &[Vec<u8>]) -> Self {
        if frames.is_empty() {
            return Self::default();
        }
        let total: usize = frames.iter().map(Vec::len).sum();
        Self {
            avg: total as f64 / frames.len() as f64,
            min: frames.iter().map(Vec::len).min().unwrap_or(0),
            max: frames.iter().map(Vec::len).max().unwrap_or(0),
        }
    }

    fn spread_below_half_avg(&self) -> bool {
        ((self.max - self.min) as f64) < 0.5 * self.avg
    }
}

/// Framing detector
#[derive(Debug, Clone, Copy, Default)]
pub struct FramingDetector;

impl FramingDetector {
    /// Create a detector
    pub fn new() -> Self {
        Self
    }

    /// Score `data` against every framing hypothesis
    pub fn detect(&self, data: &[u8]) -> FramingResult {
        if data.is_empty() {
            return FramingResult {
                note: "no data".into(),
                ..FramingResult::default()
            };
        }

        let mut candidates: Vec<FramingCandidate> = Vec::new();
        candidates.extend(self.slip(data));
        candidates.extend(self.modbus_rtu(data));
        candidates.extend(self.delimiters(data));
        candidates.sort_by(|a, b| b.confidence.cmp(&a.confidence));

        let best = candidates.first().cloned();
        let note = match &best {
            None => "no framing detected".to_string(),
            Some(best) => {
                let strength = match best.confidence {
                    80..=u8::MAX => "strong",
                    50..=79 => "possible",
                    _ => "weak",
                };
                format!("{strength} {} framing ({}% confidence)", best.mode, best.confidence)
            }
        };

        tracing::debug!(bytes = data.len(), candidates = candidates.len(), %note, "framing detection");

        FramingResult { candidates, best, note }
    }

    fn slip(&self, data: &[u8]) -> Option<FramingCandidate> {
        let markers = data.iter().filter(|&&b| b == SLIP_END).count();
        if markers < 2 {
            return None;
        }

        let decoded = decode_slip(data);
        let frames = decoded.frames;
        if frames.is_empty() {
            return None;
        }
        let lengths = FrameLengths::of(&frames);

        let mut confidence = match frames.len() {
            0..=2 => 10,
            3..=9 => 25,
            10..=49 => 40,
            _ => 50,
        };
        if decoded.escapes > 0 {
            confidence += 25;
        }
        if (4.0..=256.0).contains(&lengths.avg) {
            confidence += 15;
        }
        if lengths.spread_below_half_avg() {
            confidence += 10;
        }
        if decoded.end_markers as f64 <= 2.5 * frames.len() as f64 {
            confidence += 15;
        } else {
            confidence -= 20;
        }

        if confidence < SLIP_MIN_CONFIDENCE {
            return None;
        }
        Some(FramingCandidate::from_frames(FramingMode::Slip, confidence, &frames))
    }

    fn modbus_rtu(&self, data: &[u8]) -> Option<FramingCandidate> {
        if data.len() < MIN_RTU_FRAME {
            return None;
        }

        let mut frames: Vec<Vec<u8>> = Vec::new();
        let mut covered = 0usize;
        let mut pos = 0usize;

        while pos + MIN_RTU_FRAME <= data.len() {
            match rtu_frame_at(data, pos) {
                Some(length) => {
                    frames.push(data[pos..pos + length].to_vec());
                    covered += length;
                    pos += length;
                }
                None => pos += 1,
            }
        }

        if frames.len() < 2 {
            return None;
        }

        let mut confidence = match frames.len() {
            0..=4 => 20,
            5..=9 => 35,
            _ => 50,
        };
        let coverage = covered as f64 / data.len() as f64;
        if coverage >= 0.8 {
            confidence += 30;
        } else if coverage >= 0.5 {
            confidence += 15;
        }
        let addresses: BTreeSet<u8> = frames.iter().map(|f| f[0]).collect();
        if addresses.len() <= 3 {
            confidence += 10;
        }

        if confidence < MODBUS_MIN_CONFIDENCE {
            return None;
        }
        Some(FramingCandidate::from_frames(FramingMode::ModbusRtu, confidence, &frames))
    }

    fn delimiters(&self, data: &[u8]) -> Vec<FramingCandidate> {
        let crlf_pairs = data.windows(2).filter(|w| *w == b"\r\n").count();
        let mut found = Vec::new();

        for (name, delimiter, text_style) in DELIMITERS {
            let split = split_delimited(data, delimiter);
            if split.occurrences < 2 {
                continue;
            }
            // Bare CR / LF inside CRLF-terminated text is the CRLF candidate's job
            if (name == "LF" || name == "CR") && crlf_pairs as f64 >= 0.9 * split.occurrences as f64 {
                continue;
            }

            let frames = split.frames;
            if frames.is_empty() {
                continue;
            }
            let lengths = FrameLengths::of(&frames);

            let mut confidence = match frames.len() {
                0..=2 => 10,
                3..=9 => 20,
                _ => 35,
            };
            if (4.0..=256.0).contains(&lengths.avg) {
                confidence += 20;
            } else if (1.0..=1024.0).contains(&lengths.avg) {
                confidence += 10;
            }
            if frames.len() >= 3 && lengths.spread_below_half_avg() {
                confidence += 15;
            }
            if text_style {
                let total: usize = frames.iter().map(Vec::len).sum();
                let printable = frames
                    .iter()
                    .flatten()
                    .filter(|&&b| (0x20..=0x7E).contains(&b) || b == b'\t')
                    .count();
                if total > 0 && printable as f64 >= 0.7 * total as f64 {
                    confidence += 15;
                }
            }
            let expected = data.len() as f64 / (lengths.avg + delimiter.len() as f64);
            if split.occurrences as f64 > 2.0 * expected {
                confidence -= 10;
            }

            if confidence < DELIMITER_MIN_CONFIDENCE {
                continue;
            }

            let mut candidate = FramingCandidate::from_frames(FramingMode::Delimiter, confidence, &frames);
            candidate.delimiter = Some(delimiter.to_vec());
            candidate.delimiter_name = Some(name.to_string());
            found.push(candidate);
        }

        found
    }
}

/// Length of the shortest RTU frame starting at `pos`, if any
fn rtu_frame_at(data: &[u8], pos: usize) -> Option<usize> {
    if !has_plausible_header(&data[pos..]) {
        return None;
    }

    let mut crc = 0xFFFFu16;
    crc = crc16_modbus_update(crc, data[pos]);
    crc = crc16_modbus_update(crc, data[pos + 1]);

    // `body` bytes are folded into `crc`; the next two bytes are the trailer
    let mut body = 2;
    while body + 2 <= MAX_RTU_FRAME && pos + body + 2 <= data.len() {
        let trailer = u16::from_le_bytes([data[pos + body], data[pos + body + 1]]);
        if trailer == crc {
            return Some(body + 2);
        }
        crc = crc16_modbus_update(crc, data[pos + body]);
        body += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::framing::encode_slip;
    use crate::core::protocol::modbus::{build_rtu_request, FunctionCode};

    #[test]
    fn test_slip_stream() {
        let mut stream = Vec::new();
        for i in 1..=10u8 {
            stream.extend(encode_slip(&[i, 0xC0, 1, 2, 3, 4]));
        }

        let result = FramingDetector::new().detect(&stream);
        let best = result.best.unwrap();
        assert_eq!(best.mode, FramingMode::Slip);
        assert_eq!(best.estimated_frame_count, 10);
        assert!(best.confidence >= 50);
        assert_eq!(best.sample_frames.len(), 5);
        assert_eq!(best.sample_frames[0], vec![1, 0xC0, 1, 2, 3, 4]);
        assert!(result.note.starts_with("strong slip"));
    }

    #[test]
    fn test_modbus_stream() {
        let mut stream = Vec::new();
        for i in 0..12u16 {
            let slave = (i % 3) as u8 + 1;
            stream.extend(build_rtu_request(slave, FunctionCode::ReadHoldingRegisters, 0x0100 + i, 2));
        }

        let result = FramingDetector::new().detect(&stream);
        let best = result.best.unwrap();
        assert_eq!(best.mode, FramingMode::ModbusRtu);
        assert_eq!(best.estimated_frame_count, 12);
        assert_eq!(best.min_frame_length, 8);
        assert_eq!(best.max_frame_length, 8);
        assert_eq!(best.confidence, 90);
    }

    #[test]
    fn test_crlf_lines() {
        let result = FramingDetector::new().detect(b"AAA\r\nBBB\r\nCCC\r\n");
        let crlf = result
            .candidates
            .iter()
            .find(|c| c.delimiter_name.as_deref() == Some("CRLF"))
            .unwrap();
        assert_eq!(crlf.estimated_frame_count, 3);
        assert_eq!(crlf.avg_frame_length, 3.0);
        assert!(crlf.confidence >= 50);
        assert!(!result.candidates.iter().any(|c| c.delimiter_name.as_deref() == Some("LF")));
        assert_eq!(result.best.unwrap().delimiter, Some(b"\r\n".to_vec()));
    }

    #[test]
    fn test_bare_lf_lines() {
        let text = b"temp=21.5\nhum=40\ntemp=21.6\nhum=41\n";
        let result = FramingDetector::new().detect(text);
        let best = result.best.unwrap();
        assert_eq!(best.delimiter_name.as_deref(), Some("LF"));
        assert_eq!(best.estimated_frame_count, 4);
    }

    #[test]
    fn test_candidates_sorted_by_confidence() {
        let mut stream = Vec::new();
        for i in 1..=10u8 {
            stream.extend(encode_slip(&[i, 0xC0, 1, 2, 3, 4]));
        }
        let result = FramingDetector::new().detect(&stream);
        for pair in result.candidates.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_empty_stream() {
        let result = FramingDetector::new().detect(&[]);
        assert_eq!(result.note, "no data");
        assert!(result.best.is_none());
    }

    #[test]
    fn test_rtu_frame_at() {
        let frame = build_rtu_request(1, FunctionCode::ReadCoils, 0, 8);
        let mut data = frame.clone();
        data.extend_from_slice(&[0xFF, 0xFF]);
        assert_eq!(rtu_frame_at(&data, 0), Some(8));
        assert_eq!(rtu_frame_at(&[0, 3, 0, 0, 0], 0), None);
    }
}
