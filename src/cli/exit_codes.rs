//! CLI Exit Codes
//!
//! Standard exit codes for CLI operations and automation.

use std::process::ExitCode;

use crate::config::ConfigError;
use crate::core::analysis::AnalysisError;
use crate::core::capture::CaptureError;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// File not found
    pub const FILE_NOT_FOUND: u8 = 6;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 7;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// Capture could not be parsed
    pub const CAPTURE_ERROR: u8 = 9;

    /// Checksum primitive failed
    pub const PRIMITIVE_FAILED: u8 = 10;

    /// User cancelled
    pub const CANCELLED: u8 = 11;

    /// Analysis found nothing
    pub const PATTERN_NOT_FOUND: u8 = 16;

    /// Internal error
    pub const INTERNAL_ERROR: u8 = 127;
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success with a message
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    /// Error with an explicit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Analysis completed without finding anything
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::PATTERN_NOT_FOUND, msg.into())
    }

    /// Map any error from the analysis stack to an exit code
    pub fn from_error(err: &anyhow::Error) -> Self {
        if let Some(e) = err.downcast_ref::<CaptureError>() {
            return Self::from(e);
        }
        if let Some(e) = err.downcast_ref::<AnalysisError>() {
            return Self::from(e);
        }
        if let Some(e) = err.downcast_ref::<ConfigError>() {
            return Self::Error(ExitCodes::CONFIG_ERROR, e.to_string());
        }
        if let Some(e) = err.downcast_ref::<std::io::Error>() {
            return Self::from_io(e, err.to_string());
        }
        Self::Error(ExitCodes::ERROR, format!("{err:#}"))
    }

    fn from_io(err: &std::io::Error, msg: String) -> Self {
        use std::io::ErrorKind;

        let code = match err.kind() {
            ErrorKind::NotFound => ExitCodes::FILE_NOT_FOUND,
            ErrorKind::PermissionDenied => ExitCodes::PERMISSION_DENIED,
            _ => ExitCodes::ERROR,
        };

        Self::Error(code, msg)
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) => Some(msg),
            Self::Error(_, msg) => Some(msg),
            _ => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<&CaptureError> for CliResult {
    fn from(err: &CaptureError) -> Self {
        match err {
            CaptureError::Io { source, .. } => Self::from_io(source, err.to_string()),
            _ => Self::Error(ExitCodes::CAPTURE_ERROR, err.to_string()),
        }
    }
}

impl From<&AnalysisError> for CliResult {
    fn from(err: &AnalysisError) -> Self {
        let code = match err {
            AnalysisError::Primitive(_) => ExitCodes::PRIMITIVE_FAILED,
            AnalysisError::Cancelled => ExitCodes::CANCELLED,
            AnalysisError::InvalidOptions(_) => ExitCodes::INVALID_ARGS,
        };
        Self::Error(code, err.to_string())
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        6 => "File not found",
        7 => "Permission denied",
        8 => "Configuration error",
        9 => "Capture parse error",
        10 => "Checksum primitive failed",
        11 => "Operation cancelled",
        16 => "Pattern not found",
        127 => "Internal error",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in [0, 1, 2, 6, 7, 8, 9, 10, 11, 16, 127] {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::ChecksumError;

    #[test]
    fn test_cli_result() {
        let success = CliResult::success();
        assert!(success.is_success());
        assert_eq!(success.code(), 0);

        let error = CliResult::not_found("No checksum found");
        assert!(!error.is_success());
        assert_eq!(error.code(), ExitCodes::PATTERN_NOT_FOUND);
        assert_eq!(error.message(), Some("No checksum found"));
    }

    #[test]
    fn test_from_analysis_errors() {
        let err = anyhow::Error::new(AnalysisError::Cancelled);
        assert_eq!(CliResult::from_error(&err).code(), ExitCodes::CANCELLED);

        let err = anyhow::Error::new(AnalysisError::from(ChecksumError::Backend("down".into())));
        assert_eq!(CliResult::from_error(&err).code(), ExitCodes::PRIMITIVE_FAILED);
    }

    #[test]
    fn test_from_capture_errors() {
        let missing = CaptureError::Io {
            path: "capture.log".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file missing"),
        };
        assert_eq!(CliResult::from_error(&anyhow::Error::new(missing)).code(), ExitCodes::FILE_NOT_FOUND);

        let parse = CaptureError::Parse {
            line: 3,
            reason: "bad frame id".into(),
        };
        assert_eq!(CliResult::from_error(&anyhow::Error::new(parse)).code(), ExitCodes::CAPTURE_ERROR);
    }

    #[test]
    fn test_unknown_error() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(CliResult::from_error(&err).code(), ExitCodes::ERROR);
        assert_eq!(exit_code_description(9), "Capture parse error");
    }
}
