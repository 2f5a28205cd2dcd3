//! Byte role classification and multi-byte pattern fusion
//!
//! Each byte position is classified on its own (static, counter, sensor,
//! value), then adjacent positions are fused greedily into 16/32-bit counters
//! and sensors. Whatever is left is scanned for printable text runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Endianness;

/// Tuned thresholds for byte classification and fusion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternThresholds {
    /// Share of transitions that must carry the dominant counter step
    pub counter_consistency: f64,
    /// 8-bit deltas beyond this are treated as rollovers
    pub counter_rollover_delta: i32,
    /// Fewest unique values for a looping counter
    pub looping_min_values: usize,
    /// Most unique values for a looping counter
    pub looping_max_values: usize,
    /// Sample count from which two wraps are required
    pub looping_many_samples: usize,
    /// Share of expected wraps that must be observed
    pub looping_wrap_coverage: f64,
    /// Share of rising (or falling) transitions for a trending sensor
    pub sensor_trend_ratio: f64,
    /// Share of non-flat transitions for a mixed sensor
    pub sensor_mixed_ratio: f64,
    /// Unique/sample ratio for a free value
    pub value_unique_ratio: f64,
    /// 16-bit deltas beyond this are treated as rollovers
    pub counter16_rollover_delta: i32,
    /// Low byte at or above this is about to roll over
    pub rollover_high: u8,
    /// Low byte at or below this has just rolled over
    pub rollover_low: u8,
    /// Low word at or above this is about to roll over
    pub rollover_high_word: u16,
    /// Low word at or below this has just rolled over
    pub rollover_low_word: u16,
    /// Fewest unique values for a slow-changing byte
    pub slow_min_values: usize,
    /// Most unique values for a slow-changing byte
    pub slow_max_values: usize,
    /// Fewest samples before a byte can be called slow-changing
    pub slow_min_samples: usize,
    /// Unique/sample ratio below which a byte is slow-changing
    pub slow_max_ratio: f64,
    /// Share of printable samples for a text byte
    pub text_printable_ratio: f64,
}

impl Default for PatternThresholds {
    fn default() -> Self {
        Self {
            counter_consistency: 0.8,
            counter_rollover_delta: 200,
            looping_min_values: 3,
            looping_max_values: 16,
            looping_many_samples: 50,
            looping_wrap_coverage: 0.5,
            sensor_trend_ratio: 0.6,
            sensor_mixed_ratio: 0.5,
            value_unique_ratio: 0.1,
            counter16_rollover_delta: 60_000,
            rollover_high: 250,
            rollover_low: 5,
            rollover_high_word: 0xFA00,
            rollover_low_word: 0x05FF,
            slow_min_values: 2,
            slow_max_values: 20,
            slow_min_samples: 1000,
            slow_max_ratio: 0.001,
            text_printable_ratio: 0.9,
        }
    }
}

/// Counting direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountDirection {
    /// Incrementing
    Up,
    /// Decrementing
    Down,
}

/// Value range of a counter that wraps inside `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopRange {
    /// `max - min + 1`
    pub modulo: u16,
    /// Lowest value
    pub min: u8,
    /// Highest value
    pub max: u8,
}

/// Sensor trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorTrend {
    /// Mostly rising
    Increasing,
    /// Mostly falling
    Decreasing,
    /// Moving without a clear direction
    Mixed,
}

/// Role of one byte position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ByteRole {
    /// Never changes
    Static {
        /// The constant
        value: u8,
    },
    /// Steps by a fixed amount
    Counter {
        /// Direction
        direction: CountDirection,
        /// Step size
        step: u8,
        /// Wrapped at least once
        rollover_detected: bool,
        /// Set when the counter wraps inside a sub-range
        looping: Option<LoopRange>,
    },
    /// Continuous measurement
    Sensor {
        /// Trend
        trend: SensorTrend,
    },
    /// Free value (flag, enum, setpoint)
    Value,
    /// Nothing recognisable
    Unknown,
}

/// Per-position statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ByteStats {
    /// Byte position
    pub byte_index: usize,
    /// Payloads long enough to cover the position
    pub sample_count: usize,
    /// Lowest value
    pub min: u8,
    /// Highest value
    pub max: u8,
    /// Distinct values
    pub unique_values: usize,
    /// Classified role
    pub role: ByteRole,
}

impl ByteStats {
    /// Constant value of a static byte
    pub fn static_value(&self) -> Option<u8> {
        match self.role {
            ByteRole::Static { value } => Some(value),
            _ => None,
        }
    }

    /// Counter that wraps inside a sub-range
    pub fn is_looping_counter(&self) -> bool {
        matches!(self.role, ByteRole::Counter { looping: Some(_), .. })
    }
}

/// Kind of fused pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// 16-bit counter
    Counter16,
    /// 16-bit sensor (low byte carries into high byte)
    Sensor16,
    /// 32-bit sensor (low word carries into a slow upper word)
    Sensor32,
    /// Printable ASCII run
    Text,
}

/// A pattern spanning several bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiBytePattern {
    /// First byte
    pub start_byte: usize,
    /// Bytes covered
    pub length: usize,
    /// Kind
    pub kind: PatternKind,
    /// Byte order (numeric patterns only)
    pub endianness: Option<Endianness>,
    /// The combined value wrapped around
    pub rollover_detected: bool,
    /// A low-part rollover coincided with a carry into the high part
    pub correlated_rollover: bool,
    /// Smallest combined value
    pub min_value: u32,
    /// Largest combined value
    pub max_value: u32,
    /// Rendering from the first covering payload (text only); tab, LF and CR are escaped
    pub sample_text: Option<String>,
}

impl MultiBytePattern {
    fn numeric(start_byte: usize, length: usize, kind: PatternKind, endianness: Endianness, values: &[u32]) -> Self {
        Self {
            start_byte,
            length,
            kind,
            endianness: Some(endianness),
            rollover_detected: false,
            correlated_rollover: false,
            min_value: values.iter().copied().min().unwrap_or(0),
            max_value: values.iter().copied().max().unwrap_or(0),
            sample_text: None,
        }
    }

    /// Byte positions covered
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start_byte..self.start_byte + self.length
    }
}

/// Classifier output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatternAnalysis {
    /// Payloads analysed
    pub sample_count: usize,
    /// One entry per byte position
    pub byte_stats: Vec<ByteStats>,
    /// Non-overlapping fused patterns, ordered by start byte
    pub patterns: Vec<MultiBytePattern>,
    /// Set when there was nothing to analyse
    pub note: Option<String>,
}

/// Most frequent non-zero delta; ties go to the smallest delta.
fn dominant_delta(deltas: &[i32]) -> Option<(i32, usize)> {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for &d in deltas.iter().filter(|&&d| d != 0) {
        *counts.entry(d).or_insert(0) += 1;
    }

    let mut best: Option<(i32, usize)> = None;
    for (delta, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((delta, count));
        }
    }
    best
}

fn is_printable(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte) || matches!(byte, b'\t' | b'\n' | b'\r')
}

/// Printable bytes as-is, tab / LF / CR escaped, anything else as `.`
fn sample_char(byte: u8) -> std::borrow::Cow<'static, str> {
    match byte {
        b'\t' => "\\t".into(),
        b'\n' => "\\n".into(),
        b'\r' => "\\r".into(),
        0x20..=0x7E => char::from(byte).to_string().into(),
        _ => ".".into(),
    }
}

/// Per-byte classifier and multi-byte fusion
#[derive(Debug, Clone, Default)]
pub struct BytePatternClassifier {
    thresholds: PatternThresholds,
}

impl BytePatternClassifier {
    /// Create with custom thresholds
    pub fn new(thresholds: PatternThresholds) -> Self {
        Self { thresholds }
    }

    /// Thresholds in use
    pub fn thresholds(&self) -> &PatternThresholds {
        &self.thresholds
    }

    /// Classify every byte position and fuse multi-byte patterns
    pub fn classify<P: AsRef<[u8]>>(&self, payloads: &[P]) -> PatternAnalysis {
        if payloads.is_empty() {
            return PatternAnalysis {
                note: Some("no data".into()),
                ..PatternAnalysis::default()
            };
        }

        let max_len = payloads.iter().map(|p| p.as_ref().len()).max().unwrap_or(0);
        let byte_stats: Vec<ByteStats> = (0..max_len)
            .map(|index| {
                let values: Vec<u8> = payloads
                    .iter()
                    .filter_map(|p| p.as_ref().get(index).copied())
                    .collect();
                self.classify_byte(index, &values)
            })
            .collect();

        let patterns = self.fuse(payloads, &byte_stats, max_len);

        tracing::debug!(
            samples = payloads.len(),
            bytes = max_len,
            patterns = patterns.len(),
            "byte patterns classified"
        );

        PatternAnalysis {
            sample_count: payloads.len(),
            byte_stats,
            patterns,
            note: None,
        }
    }

    /// Classify one byte position from its values in sample order
    pub fn classify_byte(&self, byte_index: usize, values: &[u8]) -> ByteStats {
        let mut seen = [false; 256];
        for &v in values {
            seen[v as usize] = true;
        }
        let unique_values = seen.iter().filter(|&&s| s).count();
        let min = values.iter().copied().min().unwrap_or(0);
        let max = values.iter().copied().max().unwrap_or(0);

        let role = self.role_for(values, unique_values, min, max);

        ByteStats {
            byte_index,
            sample_count: values.len(),
            min,
            max,
            unique_values,
            role,
        }
    }

    fn role_for(&self, values: &[u8], unique: usize, min: u8, max: u8) -> ByteRole {
        let t = &self.thresholds;

        if unique == 0 {
            return ByteRole::Unknown;
        }
        if unique == 1 {
            return ByteRole::Static { value: values[0] };
        }

        if (t.looping_min_values..=t.looping_max_values).contains(&unique) {
            if let Some(role) = self.looping_counter(values, unique, min, max) {
                return role;
            }
        }

        if unique >= 3 {
            if let Some(role) = self.counter(values) {
                return role;
            }
            if let Some(role) = self.sensor(values) {
                return role;
            }
        }

        if unique == 2 || (unique >= 3 && unique as f64 >= t.value_unique_ratio * values.len() as f64) {
            ByteRole::Value
        } else {
            ByteRole::Unknown
        }
    }

    fn looping_counter(&self, values: &[u8], unique: usize, min: u8, max: u8) -> Option<ByteRole> {
        let t = &self.thresholds;
        let modulo = i32::from(max) - i32::from(min) + 1;
        let transitions = values.len().saturating_sub(1);
        if transitions == 0 {
            return None;
        }

        // Deltas normalised into (-modulo/2, modulo/2] so a wrap reads as a step
        let deltas: Vec<i32> = values
            .windows(2)
            .map(|w| {
                let d = (i32::from(w[1]) - i32::from(w[0])).rem_euclid(modulo);
                if d > modulo / 2 {
                    d - modulo
                } else {
                    d
                }
            })
            .collect();
        let (step, count) = dominant_delta(&deltas)?;
        if (count as f64) < t.counter_consistency * transitions as f64 {
            return None;
        }

        let up = step > 0;
        let wraps = values
            .windows(2)
            .filter(|w| if up { w[0] == max && w[1] == min } else { w[0] == min && w[1] == max })
            .count();
        let required = if values.len() >= t.looping_many_samples { 2 } else { 1 };
        if wraps < required {
            return None;
        }

        let expected_wraps = transitions as f64 * step.unsigned_abs() as f64 / modulo as f64;
        let full_range = unique as i32 == modulo;
        if !full_range && (wraps as f64) < t.looping_wrap_coverage * expected_wraps {
            return None;
        }

        Some(ByteRole::Counter {
            direction: if up { CountDirection::Up } else { CountDirection::Down },
            step: step.unsigned_abs().min(255) as u8,
            rollover_detected: true,
            looping: Some(LoopRange {
                modulo: modulo as u16,
                min,
                max,
            }),
        })
    }

    fn counter(&self, values: &[u8]) -> Option<ByteRole> {
        let t = &self.thresholds;
        let transitions = values.len().saturating_sub(1);
        if transitions == 0 {
            return None;
        }

        let (deltas, rollover) = self.corrected_deltas(values);
        let (step, count) = dominant_delta(&deltas)?;
        if (count as f64) < t.counter_consistency * transitions as f64 {
            return None;
        }

        Some(ByteRole::Counter {
            direction: if step > 0 { CountDirection::Up } else { CountDirection::Down },
            step: step.unsigned_abs().min(255) as u8,
            rollover_detected: rollover,
            looping: None,
        })
    }

    /// Byte-to-byte deltas with 8-bit wraps undone, and whether any wrap was seen
    fn corrected_deltas(&self, values: &[u8]) -> (Vec<i32>, bool) {
        let limit = self.thresholds.counter_rollover_delta;
        let mut rollover = false;
        let deltas = values
            .windows(2)
            .map(|w| {
                let d = i32::from(w[1]) - i32::from(w[0]);
                if d > limit {
                    rollover = true;
                    d - 256
                } else if d < -limit {
                    rollover = true;
                    d + 256
                } else {
                    d
                }
            })
            .collect();
        (deltas, rollover)
    }

    fn sensor(&self, values: &[u8]) -> Option<ByteRole> {
        let t = &self.thresholds;
        let transitions = values.len().saturating_sub(1);
        if transitions == 0 {
            return None;
        }

        let (deltas, _) = self.corrected_deltas(values);
        let rising = deltas.iter().filter(|&&d| d > 0).count() as f64;
        let falling = deltas.iter().filter(|&&d| d < 0).count() as f64;
        let total = transitions as f64;

        let trend = if rising / total >= t.sensor_trend_ratio {
            SensorTrend::Increasing
        } else if falling / total >= t.sensor_trend_ratio {
            SensorTrend::Decreasing
        } else if (rising + falling) / total >= t.sensor_mixed_ratio {
            SensorTrend::Mixed
        } else {
            return None;
        };

        Some(ByteRole::Sensor { trend })
    }

    // ============ Multi-byte fusion ============

    fn fuse<P: AsRef<[u8]>>(&self, payloads: &[P], stats: &[ByteStats], max_len: usize) -> Vec<MultiBytePattern> {
        let mut consumed = vec![false; max_len];
        let mut patterns = Vec::new();

        let mut index = 0;
        while index + 1 < max_len {
            if consumed[index] || consumed[index + 1] {
                index += 1;
                continue;
            }

            let found = self
                .counter16(payloads, index)
                .or_else(|| self.sensor16(payloads, index))
                .or_else(|| {
                    if index + 3 < max_len && !consumed[index..index + 4].iter().any(|&c| c) {
                        self.sensor32(payloads, stats, index)
                    } else {
                        None
                    }
                });

            match found {
                Some(pattern) => {
                    for slot in &mut consumed[pattern.span()] {
                        *slot = true;
                    }
                    index += pattern.length;
                    patterns.push(pattern);
                }
                None => index += 1,
            }
        }

        patterns.extend(self.text_runs(payloads, &consumed));
        patterns.sort_by_key(|p| p.start_byte);
        patterns
    }

    fn counter16<P: AsRef<[u8]>>(&self, payloads: &[P], index: usize) -> Option<MultiBytePattern> {
        let t = &self.thresholds;
        let pairs: Vec<[u8; 2]> = payloads
            .iter()
            .filter_map(|p| p.as_ref().get(index..index + 2).map(|s| [s[0], s[1]]))
            .collect();
        if pairs.len() < 3 {
            return None;
        }
        let transitions = pairs.len() - 1;

        for endianness in Endianness::ORDER {
            let high = |pair: &[u8; 2]| if endianness.is_big() { pair[0] } else { pair[1] };
            if pairs.iter().all(|p| high(p) == high(&pairs[0])) {
                continue;
            }

            let values: Vec<u32> = pairs
                .iter()
                .map(|p| {
                    u32::from(if endianness.is_big() {
                        u16::from_be_bytes(*p)
                    } else {
                        u16::from_le_bytes(*p)
                    })
                })
                .collect();

            let mut rollover = false;
            let deltas: Vec<i32> = values
                .windows(2)
                .map(|w| {
                    let d = w[1] as i32 - w[0] as i32;
                    if d > t.counter16_rollover_delta {
                        rollover = true;
                        d - 65_536
                    } else if d < -t.counter16_rollover_delta {
                        rollover = true;
                        d + 65_536
                    } else {
                        d
                    }
                })
                .collect();

            let Some((step, count)) = dominant_delta(&deltas) else {
                continue;
            };
            if step.abs() >= 256 || (count as f64) < t.counter_consistency * transitions as f64 {
                continue;
            }

            let mut pattern = MultiBytePattern::numeric(index, 2, PatternKind::Counter16, endianness, &values);
            pattern.rollover_detected = rollover;
            return Some(pattern);
        }

        None
    }

    fn sensor16<P: AsRef<[u8]>>(&self, payloads: &[P], index: usize) -> Option<MultiBytePattern> {
        let t = &self.thresholds;
        let pairs: Vec<[u8; 2]> = payloads
            .iter()
            .filter_map(|p| p.as_ref().get(index..index + 2).map(|s| [s[0], s[1]]))
            .collect();
        if pairs.len() < 2 {
            return None;
        }

        for endianness in Endianness::ORDER {
            let split = |pair: &[u8; 2]| {
                if endianness.is_big() {
                    (pair[1], pair[0])
                } else {
                    (pair[0], pair[1])
                }
            };

            let crossings = pairs
                .windows(2)
                .filter(|w| {
                    let (low_a, high_a) = split(&w[0]);
                    let (low_b, high_b) = split(&w[1]);
                    let carry_up = low_a >= t.rollover_high && low_b <= t.rollover_low && high_b > high_a;
                    let borrow_down = low_a <= t.rollover_low && low_b >= t.rollover_high && high_b < high_a;
                    carry_up || borrow_down
                })
                .count();
            if crossings == 0 {
                continue;
            }

            let values: Vec<u32> = pairs
                .iter()
                .map(|p| {
                    let (low, high) = split(p);
                    u32::from(u16::from_le_bytes([low, high]))
                })
                .collect();
            let mut pattern = MultiBytePattern::numeric(index, 2, PatternKind::Sensor16, endianness, &values);
            pattern.rollover_detected = true;
            pattern.correlated_rollover = true;
            return Some(pattern);
        }

        None
    }

    fn is_slow_changing(&self, stats: &ByteStats) -> bool {
        let t = &self.thresholds;
        (t.slow_min_values..=t.slow_max_values).contains(&stats.unique_values)
            && stats.sample_count >= t.slow_min_samples
            && (stats.unique_values as f64) < t.slow_max_ratio * stats.sample_count as f64
    }

    fn sensor32<P: AsRef<[u8]>>(&self, payloads: &[P], stats: &[ByteStats], index: usize) -> Option<MultiBytePattern> {
        let t = &self.thresholds;
        let quads: Vec<[u8; 4]> = payloads
            .iter()
            .filter_map(|p| p.as_ref().get(index..index + 4).map(|s| [s[0], s[1], s[2], s[3]]))
            .collect();
        if quads.len() < 2 {
            return None;
        }

        for endianness in Endianness::ORDER {
            let upper_bytes = if endianness.is_big() { [index, index + 1] } else { [index + 2, index + 3] };
            let upper_stats = [&stats[upper_bytes[0]], &stats[upper_bytes[1]]];
            let both_static = upper_stats.iter().all(|s| s.unique_values == 1);
            let each_ok = upper_stats
                .iter()
                .all(|s| s.unique_values == 1 || self.is_slow_changing(s));
            if both_static || !each_ok {
                continue;
            }

            let words = |q: &[u8; 4]| -> (u16, u16) {
                if endianness.is_big() {
                    (u16::from_be_bytes([q[2], q[3]]), u16::from_be_bytes([q[0], q[1]]))
                } else {
                    (u16::from_le_bytes([q[0], q[1]]), u16::from_le_bytes([q[2], q[3]]))
                }
            };

            let crossings = quads
                .windows(2)
                .filter(|w| {
                    let (low_a, high_a) = words(&w[0]);
                    let (low_b, high_b) = words(&w[1]);
                    let carry_up =
                        low_a >= t.rollover_high_word && low_b <= t.rollover_low_word && high_b > high_a;
                    let borrow_down =
                        low_a <= t.rollover_low_word && low_b >= t.rollover_high_word && high_b < high_a;
                    carry_up || borrow_down
                })
                .count();
            if crossings == 0 {
                continue;
            }

            let values: Vec<u32> = quads
                .iter()
                .map(|q| {
                    let (low, high) = words(q);
                    (u32::from(high) << 16) | u32::from(low)
                })
                .collect();
            let mut pattern = MultiBytePattern::numeric(index, 4, PatternKind::Sensor32, endianness, &values);
            pattern.rollover_detected = true;
            pattern.correlated_rollover = true;
            return Some(pattern);
        }

        None
    }

    fn text_runs<P: AsRef<[u8]>>(&self, payloads: &[P], consumed: &[bool]) -> Vec<MultiBytePattern> {
        let printable: Vec<bool> = consumed
            .iter()
            .enumerate()
            .map(|(index, &used)| {
                if used {
                    return false;
                }
                let (mut total, mut ok) = (0usize, 0usize);
                for byte in payloads.iter().filter_map(|p| p.as_ref().get(index)) {
                    total += 1;
                    if is_printable(*byte) {
                        ok += 1;
                    }
                }
                total > 0 && ok as f64 >= self.thresholds.text_printable_ratio * total as f64
            })
            .collect();

        let mut runs = Vec::new();
        let mut index = 0;
        while index < printable.len() {
            if !printable[index] {
                index += 1;
                continue;
            }
            let start = index;
            while index < printable.len() && printable[index] {
                index += 1;
            }
            let length = index - start;
            if length < 2 {
                continue;
            }

            let sample_text = payloads.iter().map(|p| p.as_ref()).find(|p| p.len() >= index).map(|p| {
                p[start..index].iter().map(|&b| sample_char(b)).collect::<String>()
            });

            runs.push(MultiBytePattern {
                start_byte: start,
                length,
                kind: PatternKind::Text,
                endianness: None,
                rollover_detected: false,
                correlated_rollover: false,
                min_value: 0,
                max_value: 0,
                sample_text,
            });
        }
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_byte(values: impl IntoIterator<Item = u8>) -> Vec<Vec<u8>> {
        values.into_iter().map(|v| vec![v]).collect()
    }

    #[test]
    fn test_identical_samples_are_static() {
        let payloads = vec![vec![0x12, 0x84, 0xF6]; 25];
        let analysis = BytePatternClassifier::default().classify(&payloads);
        assert_eq!(analysis.sample_count, 25);
        let constants: Vec<_> = analysis.byte_stats.iter().map(ByteStats::static_value).collect();
        assert_eq!(constants, vec![Some(0x12), Some(0x84), Some(0xF6)]);
        assert!(analysis.patterns.is_empty());
    }

    #[test]
    fn test_wrapping_counter() {
        let payloads = single_byte((0..600u32).map(|i| i as u8));
        let analysis = BytePatternClassifier::default().classify(&payloads);
        assert_eq!(
            analysis.byte_stats[0].role,
            ByteRole::Counter {
                direction: CountDirection::Up,
                step: 1,
                rollover_detected: true,
                looping: None
            }
        );
    }

    #[test]
    fn test_down_counter_with_step() {
        let payloads = single_byte((0..200u32).map(|i| 50u8.wrapping_sub((i * 3) as u8)));
        let stats = &BytePatternClassifier::default().classify(&payloads).byte_stats[0];
        match stats.role {
            ByteRole::Counter {
                direction, step, rollover_detected, ..
            } => {
                assert_eq!(direction, CountDirection::Down);
                assert_eq!(step, 3);
                assert!(rollover_detected);
            }
            other => panic!("expected counter, got {other:?}"),
        }
    }

    #[test]
    fn test_looping_counter() {
        let payloads = single_byte((0..40u8).map(|i| i % 4));
        let stats = &BytePatternClassifier::default().classify(&payloads).byte_stats[0];
        assert!(stats.is_looping_counter());
        match stats.role {
            ByteRole::Counter { looping: Some(range), .. } => {
                assert_eq!(range, LoopRange { modulo: 4, min: 0, max: 3 });
            }
            other => panic!("expected looping counter, got {other:?}"),
        }
    }

    #[test]
    fn test_counter_without_wrap_is_not_looping() {
        let payloads = single_byte(10..20u8);
        let stats = &BytePatternClassifier::default().classify(&payloads).byte_stats[0];
        assert!(!stats.is_looping_counter());
        assert!(matches!(stats.role, ByteRole::Counter { step: 1, rollover_detected: false, .. }));
    }

    #[test]
    fn test_many_samples_need_two_wraps() {
        // Step 5 modulo 16 with a single 15 -> 0 wrap
        let sequence = |n: usize| {
            let mut values = vec![0u8, 5, 10, 15, 0];
            while values.len() < n {
                let next = (values[values.len() - 1] + 5) % 16;
                values.push(next);
            }
            values.truncate(n);
            values
        };
        let classifier = BytePatternClassifier::default();

        let short = classifier.classify_byte(0, &sequence(49));
        assert!(short.is_looping_counter());

        let long = classifier.classify_byte(0, &sequence(50));
        assert_eq!(long.unique_values, 16);
        assert!(!long.is_looping_counter());
    }

    #[test]
    fn test_looping_counter_with_skipped_value() {
        let cycle = [0u8, 1, 2, 3, 4, 6, 7];
        let values: Vec<u8> = (0..42).map(|i| cycle[i % cycle.len()]).collect();
        let stats = BytePatternClassifier::default().classify_byte(0, &values);
        assert_eq!(stats.unique_values, 7);
        match stats.role {
            ByteRole::Counter {
                direction,
                step,
                looping: Some(range),
                ..
            } => {
                assert_eq!(direction, CountDirection::Up);
                assert_eq!(step, 1);
                assert_eq!(range, LoopRange { modulo: 8, min: 0, max: 7 });
            }
            other => panic!("expected looping counter, got {other:?}"),
        }
    }

    #[test]
    fn test_sensor_trend_across_byte_wrap() {
        // Rises by 41 or 43 on two of every three samples, wrapping past 255
        let mut values = vec![0u8];
        for step in [41u8, 0, 43].iter().cycle().take(199) {
            let next = values[values.len() - 1].wrapping_add(*step);
            values.push(next);
        }
        let classifier = BytePatternClassifier::default();
        let stats = classifier.classify_byte(0, &values);
        assert_eq!(stats.role, ByteRole::Sensor { trend: SensorTrend::Increasing });

        let falling: Vec<u8> = values.iter().rev().copied().collect();
        let stats = classifier.classify_byte(0, &falling);
        assert_eq!(stats.role, ByteRole::Sensor { trend: SensorTrend::Decreasing });
    }

    #[test]
    fn test_sensor_trend() {
        let mut value = 10i32;
        let mut rising = Vec::new();
        for step in [2, 3, -1, 4, 1].iter().cycle().take(40) {
            value += step;
            rising.push(value as u8);
        }
        let classifier = BytePatternClassifier::default();
        let stats = classifier.classify_byte(0, &rising);
        assert_eq!(stats.role, ByteRole::Sensor { trend: SensorTrend::Increasing });

        let falling: Vec<u8> = rising.iter().rev().copied().collect();
        let stats = classifier.classify_byte(0, &falling);
        assert_eq!(stats.role, ByteRole::Sensor { trend: SensorTrend::Decreasing });
    }

    #[test]
    fn test_two_values_is_value() {
        let values: Vec<u8> = (0..30).map(|i| if i % 3 == 0 { 1 } else { 0 }).collect();
        let stats = BytePatternClassifier::default().classify_byte(4, &values);
        assert_eq!(stats.byte_index, 4);
        assert_eq!(stats.unique_values, 2);
        assert_eq!(stats.role, ByteRole::Value);
    }

    #[test]
    fn test_short_payloads_reduce_sample_count() {
        let payloads = vec![vec![1, 2], vec![1], vec![1, 3]];
        let analysis = BytePatternClassifier::default().classify(&payloads);
        assert_eq!(analysis.byte_stats[0].sample_count, 3);
        assert_eq!(analysis.byte_stats[1].sample_count, 2);
    }

    #[test]
    fn test_counter16_little_endian() {
        let payloads: Vec<Vec<u8>> = (0..600u16)
            .map(|i| {
                let mut p = vec![0xAA];
                p.extend_from_slice(&(i * 2).to_le_bytes());
                p
            })
            .collect();
        let analysis = BytePatternClassifier::default().classify(&payloads);
        let pattern = &analysis.patterns[0];
        assert_eq!(pattern.kind, PatternKind::Counter16);
        assert_eq!(pattern.start_byte, 1);
        assert_eq!(pattern.endianness, Some(Endianness::Little));
        assert_eq!(pattern.min_value, 0);
        assert_eq!(pattern.max_value, 1198);
    }

    #[test]
    fn test_sensor16_carry() {
        let values: [u16; 11] = [
            0x00F8, 0x00FB, 0x00FA, 0x0102, 0x0101, 0x0104, 0x01F9, 0x01FC, 0x0203, 0x0201, 0x01FE,
        ];
        let payloads: Vec<Vec<u8>> = values.iter().map(|v| v.to_be_bytes().to_vec()).collect();
        let analysis = BytePatternClassifier::default().classify(&payloads);
        assert_eq!(analysis.patterns.len(), 1);
        let pattern = &analysis.patterns[0];
        assert_eq!(pattern.kind, PatternKind::Sensor16);
        assert_eq!(pattern.endianness, Some(Endianness::Big));
        assert!(pattern.correlated_rollover);
        assert_eq!(pattern.min_value, 0x00F8);
        assert_eq!(pattern.max_value, 0x0203);
    }

    #[test]
    fn test_sensor32_with_slow_upper_word() {
        // Oscillates around 0x0001_0000; the low byte never carries into byte 1
        let cycle: [u32; 6] = [0xFCF0, 0x1_0210, 0x1_0310, 0xFBF0, 0xFAF0, 0x1_0410];
        let payloads: Vec<Vec<u8>> = (0..2500).map(|i| cycle[i % cycle.len()].to_le_bytes().to_vec()).collect();
        let analysis = BytePatternClassifier::default().classify(&payloads);
        assert_eq!(analysis.patterns.len(), 1);
        let pattern = &analysis.patterns[0];
        assert_eq!(pattern.kind, PatternKind::Sensor32);
        assert_eq!(pattern.start_byte, 0);
        assert_eq!(pattern.length, 4);
        assert_eq!(pattern.endianness, Some(Endianness::Little));
        assert_eq!(pattern.min_value, 0xFAF0);
        assert_eq!(pattern.max_value, 0x1_0410);
    }

    #[test]
    fn test_text_run() {
        let words = [b"ALPHA", b"BRAVO", b"DELTA"];
        let payloads: Vec<Vec<u8>> = (0..30u8)
            .map(|i| {
                let mut p = words[i as usize % words.len()].to_vec();
                p.push(i);
                p
            })
            .collect();
        let analysis = BytePatternClassifier::default().classify(&payloads);
        let text: Vec<_> = analysis.patterns.iter().filter(|p| p.kind == PatternKind::Text).collect();
        assert_eq!(text.len(), 1);
        assert_eq!(text[0].start_byte, 0);
        assert_eq!(text[0].length, 5);
        assert_eq!(text[0].sample_text.as_deref(), Some("ALPHA"));
    }

    #[test]
    fn test_text_run_escapes_line_endings() {
        let payloads: Vec<Vec<u8>> = (0..20u8).map(|i| vec![0x90 + i, b'O', b'K', b'\r', b'\n']).collect();
        let analysis = BytePatternClassifier::default().classify(&payloads);
        let text = analysis.patterns.iter().find(|p| p.kind == PatternKind::Text).unwrap();
        assert_eq!(text.start_byte, 1);
        assert_eq!(text.length, 4);
        assert_eq!(text.sample_text.as_deref(), Some("OK\\r\\n"));
    }

    #[test]
    fn test_patterns_never_overlap() {
        let payloads: Vec<Vec<u8>> = (0..800u32)
            .map(|i| {
                let mut p = (i as u16).to_le_bytes().to_vec();
                p.extend_from_slice(b"OK");
                p.extend_from_slice(&((i * 3) as u16).to_be_bytes());
                p
            })
            .collect();
        let analysis = BytePatternClassifier::default().classify(&payloads);
        assert!(analysis.patterns.len() >= 2);
        for pair in analysis.patterns.windows(2) {
            assert!(pair[0].span().end <= pair[1].start_byte);
        }
    }

    #[test]
    fn test_empty_input() {
        let analysis = BytePatternClassifier::default().classify::<Vec<u8>>(&[]);
        assert_eq!(analysis.note.as_deref(), Some("no data"));
        assert!(analysis.byte_stats.is_empty());
    }
}
