//! Report rendering
//!
//! Every analysis result renders either as pretty JSON or as a compact text
//! report for the terminal.

use clap::ValueEnum;
use serde::Serialize;

use crate::core::analysis::{
    ByteRole, ByteStats, ChecksumCandidate, DetectedChecksum, DiscoveryResult, Endianness, FramingResult,
    MirrorGroup, PatternAnalysis, PayloadAnalysis,
};

/// CLI output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format for scripting
    Json,
}

/// Render `value` in `format`, using `text` for the text form
pub fn render<T, F>(format: OutputFormat, value: &T, text: F) -> serde_json::Result<String>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(value),
        OutputFormat::Text => Ok(text(value)),
    }
}

/// Space-separated hex bytes
pub fn hex_format(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ")
}

fn endian_label(endianness: Option<Endianness>) -> &'static str {
    match endianness {
        Some(Endianness::Little) => "LE",
        Some(Endianness::Big) => "BE",
        None => "--",
    }
}

/// Ranked auto-detection results
pub fn detected_text(results: &[DetectedChecksum]) -> String {
    if results.is_empty() {
        return "No matching checksum algorithm".to_string();
    }

    let mut lines = vec![format!("{:<16} {:<4} {:>5} {:>9} {:>8}", "ALGORITHM", "END", "POS", "MATCHES", "RATE")];
    for r in results {
        lines.push(format!(
            "{:<16} {:<4} {:>5} {:>9} {:>7.1}%",
            r.algorithm.id(),
            endian_label(r.endianness),
            r.position,
            format!("{}/{}", r.match_count, r.total_count),
            r.match_rate
        ));
    }
    lines.join("\n")
}

fn candidate_line(c: &ChecksumCandidate) -> String {
    format!(
        "  pos {:>3}  len {}  {:<2}  {}{}  {}/{} ({:.1}%)",
        c.position,
        c.length,
        endian_label(c.endianness),
        c.kind.label(),
        if c.includes_frame_id { " +id" } else { "" },
        c.match_count,
        c.total_count,
        c.match_rate
    )
}

/// Per-frame-ID discovery results
pub fn discovery_text(result: &DiscoveryResult) -> String {
    let mut lines = Vec::new();
    for (id, candidates) in &result.candidates {
        lines.push(format!("0x{:03X}", id));
        lines.extend(candidates.iter().map(candidate_line));
    }
    if !result.skipped_frame_ids.is_empty() {
        let skipped: Vec<String> = result.skipped_frame_ids.iter().map(|id| format!("0x{:X}", id)).collect();
        lines.push(format!("Skipped (too few samples): {}", skipped.join(", ")));
    }
    lines.push(format!(
        "{} frame ID(s) with checksum, {} without",
        result.summary.frames_with_checksum, result.summary.frames_without_checksum
    ));
    if let Some(common) = &result.summary.most_common_algorithm {
        lines.push(format!("Most common: {}", common));
    }
    lines.join("\n")
}

fn role_label(stats: &ByteStats) -> String {
    match stats.role {
        ByteRole::Static { value } => format!("static 0x{:02X}", value),
        ByteRole::Counter {
            direction,
            step,
            rollover_detected,
            looping,
        } => {
            let mut label = format!("counter {:?} step {}", direction, step).to_lowercase();
            if let Some(range) = looping {
                label.push_str(&format!(" loop {}..={}", range.min, range.max));
            } else if rollover_detected {
                label.push_str(" rollover");
            }
            label
        }
        ByteRole::Sensor { trend } => format!("sensor {:?}", trend).to_lowercase(),
        ByteRole::Value => "value".to_string(),
        ByteRole::Unknown => "unknown".to_string(),
    }
}

/// Byte roles and fused patterns
pub fn patterns_text(analysis: &PatternAnalysis) -> String {
    if let Some(note) = &analysis.note {
        return note.clone();
    }

    let mut lines = vec![format!("{} sample(s)", analysis.sample_count)];
    for stats in &analysis.byte_stats {
        lines.push(format!(
            "  byte {:>2}  {:<28} {:>3} unique  [{:02X}..{:02X}]",
            stats.byte_index,
            role_label(stats),
            stats.unique_values,
            stats.min,
            stats.max
        ));
    }
    for p in &analysis.patterns {
        let mut line = format!(
            "  bytes {}..{}  {:?} {}",
            p.start_byte,
            p.start_byte + p.length,
            p.kind,
            endian_label(p.endianness)
        );
        match &p.sample_text {
            Some(text) => line.push_str(&format!("  \"{}\"", text)),
            None => line.push_str(&format!("  {}..={}", p.min_value, p.max_value)),
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Payload analysis for one frame ID
pub fn payload_text(analysis: &PayloadAnalysis) -> String {
    if let Some(note) = &analysis.note {
        return note.clone();
    }

    match (&analysis.mux, &analysis.patterns) {
        (Some(mux), _) => {
            let mut lines = vec![format!("{:?} mux, {} selector(s)", mux.kind, mux.selector_values.len())];
            for case in &analysis.cases {
                lines.push(format!("selector 0x{:X} ({} samples)", case.selector, case.sample_count));
                lines.push(patterns_text(&case.patterns));
            }
            lines.join("\n")
        }
        (None, Some(patterns)) => patterns_text(patterns),
        (None, None) => String::new(),
    }
}

/// Framing detection
pub fn framing_text(result: &FramingResult) -> String {
    let mut lines = vec![result.note.clone()];
    for c in &result.candidates {
        let name = c.delimiter_name.as_deref().map(|n| format!(" {}", n)).unwrap_or_default();
        lines.push(format!(
            "  {}{}  {}%  {} frames  len {:.1} [{}..{}]",
            c.mode, name, c.confidence, c.estimated_frame_count, c.avg_frame_length, c.min_frame_length, c.max_frame_length
        ));
        for frame in &c.sample_frames {
            lines.push(format!("    {}", hex_format(frame)));
        }
    }
    lines.join("\n")
}

/// Mirror groups
pub fn mirrors_text(groups: &[MirrorGroup]) -> String {
    if groups.is_empty() {
        return "No mirrored frame IDs".to_string();
    }
    groups
        .iter()
        .map(|g| {
            let ids: Vec<String> = g.frame_ids.iter().map(|id| format!("0x{:X}", id)).collect();
            format!(
                "{}  {}/{} ({:.1}%)  {}",
                ids.join(" = "),
                g.match_count,
                g.total_count,
                g.match_percentage,
                hex_format(&g.sample_payload)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analysis::{BytePatternClassifier, FramingDetector};

    #[test]
    fn test_hex_format() {
        assert_eq!(hex_format(&[0x01, 0xab]), "01 ab");
        assert_eq!(hex_format(&[]), "");
    }

    #[test]
    fn test_render_json_and_text() {
        let result = FramingDetector::new().detect(b"AAA\r\nBBB\r\nCCC\r\n");
        let json = render(OutputFormat::Json, &result, framing_text).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["best"]["mode"], "delimiter");

        let text = render(OutputFormat::Text, &result, framing_text).unwrap();
        assert!(text.contains("CRLF"));
    }

    #[test]
    fn test_patterns_text() {
        let payloads: Vec<Vec<u8>> = (0..20u8).map(|i| vec![0x42, i]).collect();
        let text = patterns_text(&BytePatternClassifier::default().classify(&payloads));
        assert!(text.contains("static 0x42"));
        assert!(text.contains("counter up step 1"));
    }

    #[test]
    fn test_empty_reports() {
        assert_eq!(mirrors_text(&[]), "No mirrored frame IDs");
        assert_eq!(detected_text(&[]), "No matching checksum algorithm");
    }
}
