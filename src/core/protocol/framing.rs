//! Stream framing codecs
//!
//! Supports: SLIP (RFC 1055) and delimiter-terminated frames. The decoders keep
//! the counters the framing detector scores on (markers, escapes, occurrences).

/// SLIP frame end marker
pub const SLIP_END: u8 = 0xC0;
/// SLIP escape byte
pub const SLIP_ESC: u8 = 0xDB;
/// Escaped END
pub const SLIP_ESC_END: u8 = 0xDC;
/// Escaped ESC
pub const SLIP_ESC_ESC: u8 = 0xDD;

/// Result of decoding a SLIP stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlipDecode {
    /// Non-empty decoded frames, in stream order
    pub frames: Vec<Vec<u8>>,
    /// Number of END markers in the stream
    pub end_markers: usize,
    /// Number of valid escape sequences seen
    pub escapes: usize,
}

/// Result of splitting a stream on a delimiter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelimitedSplit {
    /// Non-empty segments that were terminated by the delimiter
    pub frames: Vec<Vec<u8>>,
    /// Number of delimiter occurrences (non-overlapping)
    pub occurrences: usize,
}

// ============ SLIP (RFC 1055) ============

/// Encode one packet as a SLIP frame (leading and trailing END)
pub fn encode_slip(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() * 2 + 2);

    // Leading END flushes any line noise on the receiver
    result.push(SLIP_END);

    for &byte in data {
        match byte {
            SLIP_END => {
                result.push(SLIP_ESC);
                result.push(SLIP_ESC_END);
            }
            SLIP_ESC => {
                result.push(SLIP_ESC);
                result.push(SLIP_ESC_ESC);
            }
            _ => result.push(byte),
        }
    }

    result.push(SLIP_END);
    result
}

/// Decode a SLIP stream.
///
/// Bytes after the last END are an incomplete packet and are dropped.
pub fn decode_slip(data: &[u8]) -> SlipDecode {
    let mut decoded = SlipDecode::default();
    let mut current = Vec::new();
    let mut escape = false;

    for &byte in data {
        if escape {
            match byte {
                SLIP_ESC_END => {
                    current.push(SLIP_END);
                    decoded.escapes += 1;
                }
                SLIP_ESC_ESC => {
                    current.push(SLIP_ESC);
                    decoded.escapes += 1;
                }
                _ => current.push(byte), // protocol violation, keep the byte
            }
            escape = false;
            continue;
        }

        match byte {
            SLIP_END => {
                decoded.end_markers += 1;
                if !current.is_empty() {
                    decoded.frames.push(std::mem::take(&mut current));
                }
            }
            SLIP_ESC => escape = true,
            _ => current.push(byte),
        }
    }

    decoded
}

// ============ Delimiter-terminated ============

/// Split a stream into delimiter-terminated frames.
///
/// Zero-length segments are dropped; a trailing segment with no delimiter is
/// an incomplete frame and is ignored.
pub fn split_delimited(data: &[u8], delimiter: &[u8]) -> DelimitedSplit {
    let mut split = DelimitedSplit::default();
    if delimiter.is_empty() {
        return split;
    }

    let mut start = 0;
    let mut i = 0;

    while i + delimiter.len() <= data.len() {
        if &data[i..i + delimiter.len()] == delimiter {
            split.occurrences += 1;
            if i > start {
                split.frames.push(data[start..i].to_vec());
            }
            i += delimiter.len();
            start = i;
        } else {
            i += 1;
        }
    }

    split
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slip_escapes_are_counted() {
        let original = vec![0xC0, 0xDB, 0x01, 0x02, 0x03];
        let encoded = encode_slip(&original);
        let decoded = decode_slip(&encoded);
        assert_eq!(decoded.frames, vec![original]);
        assert_eq!(decoded.end_markers, 2);
        assert_eq!(decoded.escapes, 2);
    }

    #[test]
    fn test_slip_drops_incomplete_tail() {
        let mut stream = encode_slip(&[1, 2, 3]);
        stream.extend_from_slice(&[4, 5, 6]);
        let decoded = decode_slip(&stream);
        assert_eq!(decoded.frames, vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_split_crlf() {
        let split = split_delimited(b"AAA\r\nBBB\r\nCCC\r\nDD", b"\r\n");
        assert_eq!(split.occurrences, 3);
        assert_eq!(split.frames, vec![b"AAA".to_vec(), b"BBB".to_vec(), b"CCC".to_vec()]);
    }

    #[test]
    fn test_split_drops_empty_segments() {
        let split = split_delimited(&[0, 0, 1, 2, 0, 0, 3, 0], &[0]);
        assert_eq!(split.occurrences, 5);
        assert_eq!(split.frames, vec![vec![1, 2], vec![3]]);
    }
}
