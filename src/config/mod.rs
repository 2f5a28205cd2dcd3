//! Configuration module
//!
//! Handles analysis thresholds and logging settings

mod settings;

pub use settings::{AnalysisConfig, ConfigError, LoggingConfig};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "protoscope", "Protoscope").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default configuration file path
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}
