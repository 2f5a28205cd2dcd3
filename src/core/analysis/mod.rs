//! Pattern discovery over captured frames and raw streams
//!
//! This module provides:
//! - Checksum auto-detection against the algorithm registry
//! - Per-frame-ID checksum discovery with CRC brute force
//! - Byte role classification and multi-byte / text pattern fusion
//! - Multiplexed-frame selector detection
//! - Stream framing inference (SLIP, Modbus RTU, delimiters)
//! - Mirror frame grouping across frame IDs
//!
//! Every analysis is a pure function of its inputs; identical inputs and
//! options give identical results.

pub mod byte_patterns;
pub mod checksum_detect;
pub mod checksum_discovery;
pub mod error;
pub mod frame;
pub mod framing_detect;
pub mod mirror;
pub mod mux;
pub mod payload;
pub mod progress;

pub use byte_patterns::{
    BytePatternClassifier, ByteRole, ByteStats, MultiBytePattern, PatternAnalysis, PatternKind, PatternThresholds,
};
pub use checksum_detect::{detect_checksum, match_rate, ChecksumConfig, DetectOptions, DetectedChecksum};
pub use checksum_discovery::{
    ChecksumCandidate, ChecksumDiscoveryEngine, ChecksumKind, DiscoveryOptions, DiscoveryResult, DiscoverySummary,
};
pub use error::{AnalysisError, Result};
pub use frame::{Frame, FrameSource, TimedPayload};
pub use framing_detect::{FramingCandidate, FramingDetector, FramingMode, FramingResult};
pub use mirror::{MirrorFrameDetector, MirrorGroup, MirrorOptions};
pub use mux::{MuxDetectionResult, MuxDetector, MuxKind, MuxThresholds};
pub use payload::{MuxCase, PayloadAnalysis, PayloadAnalyzer};
pub use progress::{progress_channel, DiscoveryPhase, DiscoveryProgress, ProgressReceiver, ProgressSender};

use serde::{Deserialize, Serialize};

/// Byte order of a multi-byte field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endianness {
    /// Least significant byte first
    Little,
    /// Most significant byte first
    Big,
}

impl Endianness {
    /// Little first, then big
    pub const ORDER: [Endianness; 2] = [Endianness::Little, Endianness::Big];

    /// `true` for big-endian
    pub fn is_big(&self) -> bool {
        matches!(self, Endianness::Big)
    }
}

/// Match percentage in `[0, 100]`; zero when nothing was compared
pub(crate) fn percentage(matches: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        matches as f64 * 100.0 / total as f64
    }
}
