//! Multiplexed frame detection
//!
//! A multiplexed frame carries a small selector in its first byte (or first
//! two bytes) and a different layout per selector value.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Thresholds for selector detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxThresholds {
    /// Fewest payloads to consider
    pub min_payloads: usize,
    /// Most distinct selector values
    pub max_selector_values: usize,
    /// Selector range must start at or below this
    pub max_min_value: u8,
    /// Selector values must stay at or below this
    pub max_selector_value: u8,
    /// Distinct values / value range
    pub min_coverage: f64,
    /// Distinct values that satisfy coverage on their own
    pub min_values_for_coverage: usize,
    /// Max/min occurrence ratio for one selector byte
    pub single_balance: f64,
    /// Max/min occurrence ratio for combined two-byte selectors
    pub two_byte_balance: f64,
}

impl Default for MuxThresholds {
    fn default() -> Self {
        Self {
            min_payloads: 4,
            max_selector_values: 16,
            max_min_value: 2,
            max_selector_value: 31,
            min_coverage: 0.5,
            min_values_for_coverage: 4,
            single_balance: 3.0,
            two_byte_balance: 2.0,
        }
    }
}

/// Selector width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuxKind {
    /// Selector in byte 0
    SingleByte,
    /// Selector in bytes 0 and 1 (`byte0 * 256 + byte1`)
    TwoByte,
}

/// Detected selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MuxDetectionResult {
    /// Selector width
    pub kind: MuxKind,
    /// Observed selector values, ascending
    pub selector_values: Vec<u16>,
    /// Payloads per selector value
    pub occurrence_counts: BTreeMap<u16, usize>,
}

impl MuxDetectionResult {
    /// Selector value of a payload
    pub fn key(&self, payload: &[u8]) -> Option<u16> {
        match (self.kind, payload) {
            (MuxKind::SingleByte, [b0, ..]) => Some(u16::from(*b0)),
            (MuxKind::TwoByte, [b0, b1, ..]) => Some(u16::from(*b0) * 256 + u16::from(*b1)),
            _ => None,
        }
    }
}

fn balanced<K>(counts: &BTreeMap<K, usize>, ratio: f64) -> bool {
    let max = counts.values().copied().max().unwrap_or(0);
    let min = counts.values().copied().min().unwrap_or(0);
    min > 0 && max as f64 <= ratio * min as f64
}

/// Selector detector
#[derive(Debug, Clone, Default)]
pub struct MuxDetector {
    thresholds: MuxThresholds,
}

impl MuxDetector {
    /// Create with custom thresholds
    pub fn new(thresholds: MuxThresholds) -> Self {
        Self { thresholds }
    }

    /// Detect a selector, preferring two bytes when both pass
    pub fn detect<P: AsRef<[u8]>>(&self, payloads: &[P]) -> Option<MuxDetectionResult> {
        let t = &self.thresholds;
        if payloads.len() < t.min_payloads || payloads.iter().any(|p| p.as_ref().is_empty()) {
            return None;
        }

        let mut first: BTreeMap<u8, usize> = BTreeMap::new();
        for payload in payloads {
            *first.entry(payload.as_ref()[0]).or_insert(0) += 1;
        }
        if !self.selector_like(&first) {
            return None;
        }

        if let Some(result) = self.two_byte(payloads) {
            tracing::debug!(selectors = result.selector_values.len(), "two-byte mux detected");
            return Some(result);
        }

        let occurrence_counts: BTreeMap<u16, usize> = first.into_iter().map(|(k, v)| (u16::from(k), v)).collect();
        tracing::debug!(selectors = occurrence_counts.len(), "single-byte mux detected");
        Some(MuxDetectionResult {
            kind: MuxKind::SingleByte,
            selector_values: occurrence_counts.keys().copied().collect(),
            occurrence_counts,
        })
    }

    fn selector_like(&self, counts: &BTreeMap<u8, usize>) -> bool {
        let t = &self.thresholds;
        let unique = counts.len();
        if !(2..=t.max_selector_values).contains(&unique) {
            return false;
        }

        let (Some(&min), Some(&max)) = (counts.keys().next(), counts.keys().next_back()) else {
            return false;
        };
        if min > t.max_min_value || max > t.max_selector_value {
            return false;
        }

        let range = f64::from(max - min) + 1.0;
        let covered = unique as f64 / range >= t.min_coverage || unique >= t.min_values_for_coverage;

        covered && balanced(counts, t.single_balance)
    }

    fn two_byte<P: AsRef<[u8]>>(&self, payloads: &[P]) -> Option<MuxDetectionResult> {
        if payloads.iter().any(|p| p.as_ref().len() < 2) {
            return None;
        }

        let mut second_by_first: BTreeMap<u8, BTreeSet<u8>> = BTreeMap::new();
        let mut second: BTreeMap<u8, usize> = BTreeMap::new();
        let mut combined: BTreeMap<u16, usize> = BTreeMap::new();
        for payload in payloads {
            let p = payload.as_ref();
            second_by_first.entry(p[0]).or_default().insert(p[1]);
            *second.entry(p[1]).or_insert(0) += 1;
            *combined.entry(u16::from(p[0]) * 256 + u16::from(p[1])).or_insert(0) += 1;
        }

        let mut sets = second_by_first.values();
        let reference = sets.next()?;
        if sets.any(|s| s != reference) {
            return None;
        }
        if !self.selector_like(&second) || !balanced(&combined, self.thresholds.two_byte_balance) {
            return None;
        }

        Some(MuxDetectionResult {
            kind: MuxKind::TwoByte,
            selector_values: combined.keys().copied().collect(),
            occurrence_counts: combined,
        })
    }
}
