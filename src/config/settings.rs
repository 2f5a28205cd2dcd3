//! Analysis settings

use crate::core::analysis::{DiscoveryOptions, MirrorOptions, MuxThresholds, PatternThresholds};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// File is not valid TOML for this schema
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    /// Settings could not be encoded
    #[error("Could not encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    /// No platform config directory
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Analysis configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Checksum discovery
    pub checksum: DiscoveryOptions,
    /// Byte classification thresholds
    pub patterns: PatternThresholds,
    /// Mux detection thresholds
    pub mux: MuxThresholds,
    /// Mirror detection
    pub mirror: MirrorOptions,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl AnalysisConfig {
    /// Load config from the platform config directory, or defaults if absent
    pub fn load() -> Result<Self, ConfigError> {
        match super::config_file() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load config from a file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to the platform config directory
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = super::config_file().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(path)
    }

    /// Save config to a file, creating parent directories
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (`RUST_LOG` wins when set)
    pub level: String,
    /// Emit JSON log lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AnalysisConfig::default();
        config.checksum.min_match_rate = 90.0;
        config.checksum.checksum_positions = vec![-1, 7];
        config.mirror.tolerance_us = 5_000;
        config.logging.json = true;
        config.save_to(&path).unwrap();

        assert_eq!(AnalysisConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            [checksum]
            brute_force_crc16 = true

            [patterns]
            counter_consistency = 0.9
            "#,
        )
        .unwrap();

        assert!(config.checksum.brute_force_crc16);
        assert_eq!(config.checksum.min_samples, 10);
        assert_eq!(config.patterns.counter_consistency, 0.9);
        assert_eq!(config.patterns.looping_max_values, 16);
        assert_eq!(config.mux, MuxThresholds::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[checksum]\nmin_samples = \"many\"").unwrap();
        assert!(matches!(AnalysisConfig::load_from(&path), Err(ConfigError::Parse(_))));
        assert!(matches!(
            AnalysisConfig::load_from(dir.path().join("absent.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
