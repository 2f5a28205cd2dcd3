//! Analysis errors

use crate::core::protocol::checksum::ChecksumError;

/// Errors raised by an analysis call.
///
/// Low scores and empty inputs are results, not errors.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The checksum primitive failed; the current discovery call is aborted
    #[error("Checksum primitive failed: {0}")]
    Primitive(#[from] ChecksumError),

    /// The caller cancelled the analysis
    #[error("Analysis cancelled")]
    Cancelled,

    /// Options that cannot produce a meaningful search
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

/// Analysis result alias
pub type Result<T> = std::result::Result<T, AnalysisError>;
