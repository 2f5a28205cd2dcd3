//! # Protoscope Core Library
//!
//! Reverse-engineering toolkit for unknown binary protocols. Given captured
//! frames or a raw byte stream it discovers:
//! - Checksums per frame ID (known algorithms, CRC-8 / CRC-16 brute force)
//! - Byte roles: static, counter, sensor, value
//! - Multi-byte counters and sensors, embedded ASCII text
//! - Multiplexed frames and their selector byte(s)
//! - Stream framing (SLIP, Modbus RTU, delimiters)
//! - Frame IDs that mirror each other across buses
//!
//! ## Example
//!
//! ```rust,no_run
//! use protoscope_core::{read_capture, ChecksumDiscoveryEngine, DiscoveryOptions, NativeChecksum};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let frames = read_capture("bus.log")?;
//!     let engine = ChecksumDiscoveryEngine::new(NativeChecksum, DiscoveryOptions::default());
//!     let result = engine.discover(&frames).await?;
//!
//!     for (id, candidates) in &result.candidates {
//!         println!("0x{:X}: {}", id, candidates[0].kind.label());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{AnalysisConfig, ConfigError, LoggingConfig};
pub use crate::core::analysis::{
    detect_checksum, AnalysisError, BytePatternClassifier, ChecksumDiscoveryEngine, DetectOptions, DiscoveryOptions,
    DiscoveryResult, Frame, FramingDetector, FramingResult, MirrorFrameDetector, MirrorGroup, MirrorOptions,
    MuxDetector, PatternAnalysis, PayloadAnalysis, PayloadAnalyzer,
};
pub use crate::core::capture::{parse_candump, read_capture, read_hex, read_raw, CaptureError};
pub use crate::core::protocol::{ChecksumAlgorithm, ChecksumPrimitive, NativeChecksum};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
