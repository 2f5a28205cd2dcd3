//! Payload analysis for one frame ID
//!
//! Runs mux detection first; a multiplexed frame is classified per selector
//! value, anything else is classified as a whole.

use serde::Serialize;
use std::collections::BTreeMap;

use super::byte_patterns::{BytePatternClassifier, PatternAnalysis, PatternThresholds};
use super::mux::{MuxDetectionResult, MuxDetector, MuxThresholds};

/// Patterns for one selector value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MuxCase {
    /// Selector value
    pub selector: u16,
    /// Payloads carrying this selector
    pub sample_count: usize,
    /// Classification of those payloads
    pub patterns: PatternAnalysis,
}

/// Result of [`PayloadAnalyzer::analyze`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PayloadAnalysis {
    /// Payloads analysed
    pub sample_count: usize,
    /// Detected selector
    pub mux: Option<MuxDetectionResult>,
    /// Per-selector classification, ascending selector (mux only)
    pub cases: Vec<MuxCase>,
    /// Whole-set classification (no mux)
    pub patterns: Option<PatternAnalysis>,
    /// Set when there was nothing to analyse
    pub note: Option<String>,
}

/// Mux detection followed by byte classification
#[derive(Debug, Clone, Default)]
pub struct PayloadAnalyzer {
    mux: MuxDetector,
    classifier: BytePatternClassifier,
}

impl PayloadAnalyzer {
    /// Create with custom thresholds
    pub fn new(mux: MuxThresholds, patterns: PatternThresholds) -> Self {
        Self {
            mux: MuxDetector::new(mux),
            classifier: BytePatternClassifier::new(patterns),
        }
    }

    /// Analyse the payloads of one frame ID
    pub fn analyze<P: AsRef<[u8]>>(&self, payloads: &[P]) -> PayloadAnalysis {
        if payloads.is_empty() {
            return PayloadAnalysis {
                note: Some("no data".into()),
                ..PayloadAnalysis::default()
            };
        }

        let Some(mux) = self.mux.detect(payloads) else {
            return PayloadAnalysis {
                sample_count: payloads.len(),
                patterns: Some(self.classifier.classify(payloads)),
                ..PayloadAnalysis::default()
            };
        };

        let mut partitions: BTreeMap<u16, Vec<&[u8]>> = BTreeMap::new();
        for payload in payloads {
            let payload = payload.as_ref();
            if let Some(key) = mux.key(payload) {
                partitions.entry(key).or_default().push(payload);
            }
        }

        let cases = partitions
            .into_iter()
            .map(|(selector, group)| MuxCase {
                selector,
                sample_count: group.len(),
                patterns: self.classifier.classify(&group),
            })
            .collect();

        PayloadAnalysis {
            sample_count: payloads.len(),
            mux: Some(mux),
            cases,
            patterns: None,
            note: None,
        }
    }
}
