//! CLI Module
//!
//! Provides command-line interface functionality including:
//! - Exit codes for automation
//! - Text and JSON report rendering

pub mod exit_codes;
pub mod report;

pub use exit_codes::{exit_code_description, print_exit_codes, CliResult, ExitCodes};
pub use report::{render, OutputFormat};
