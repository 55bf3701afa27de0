//! Scan configuration.
//!
//! Defaults, optional TOML file, then `DELTA_CHANGE_*` environment overrides.

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::resolver::IdComparison;

/// Scan configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Name of the log directory under the table root
    pub log_dir_name: String,
    /// Zero-padded width of commit file names
    pub version_width: usize,
    /// How row ids are compared with the lookup value
    pub id_comparison: IdComparison,
    /// chrono format string for record timestamps (UTC)
    pub timestamp_format: String,
    /// Reject log lines carrying no recognized action
    pub strict_log_entries: bool,
    /// Maximum retry attempts for transient log read errors
    pub log_read_max_retries: u32,
    /// Delay between retry attempts in milliseconds
    pub log_read_retry_delay_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            log_dir_name: "_delta_log".to_string(),
            version_width: 20,
            id_comparison: IdComparison::StringNormalized,
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            strict_log_entries: false,
            log_read_max_retries: 3,
            log_read_retry_delay_ms: 100,
        }
    }
}

impl ScanConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ScanError::ConfigError(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string. Missing keys keep their defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self, ScanError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| ScanError::ConfigError(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment variable overrides.
    /// Variables are prefixed with `DELTA_CHANGE_`, e.g.
    /// `DELTA_CHANGE_VERSION_WIDTH=10` overrides `version_width`.
    pub fn apply_env_overrides(&mut self) -> Result<(), ScanError> {
        if let Ok(val) = env::var("DELTA_CHANGE_LOG_DIR_NAME") {
            self.log_dir_name = val;
        }
        if let Ok(val) = env::var("DELTA_CHANGE_VERSION_WIDTH") {
            self.version_width = val.parse().map_err(|_| {
                ScanError::ConfigError(format!("Invalid version_width: {}", val))
            })?;
        }
        if let Ok(val) = env::var("DELTA_CHANGE_ID_COMPARISON") {
            self.id_comparison = val.parse()?;
        }
        if let Ok(val) = env::var("DELTA_CHANGE_TIMESTAMP_FORMAT") {
            self.timestamp_format = val;
        }
        if let Ok(val) = env::var("DELTA_CHANGE_STRICT_LOG_ENTRIES") {
            self.strict_log_entries = val.parse().map_err(|_| {
                ScanError::ConfigError(format!("Invalid strict_log_entries: {}", val))
            })?;
        }
        if let Ok(val) = env::var("DELTA_CHANGE_LOG_READ_MAX_RETRIES") {
            self.log_read_max_retries = val.parse().map_err(|_| {
                ScanError::ConfigError(format!("Invalid log_read_max_retries: {}", val))
            })?;
        }
        if let Ok(val) = env::var("DELTA_CHANGE_LOG_READ_RETRY_DELAY_MS") {
            self.log_read_retry_delay_ms = val.parse().map_err(|_| {
                ScanError::ConfigError(format!("Invalid log_read_retry_delay_ms: {}", val))
            })?;
        }
        self.validate()
    }

    /// Checks field invariants.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.log_dir_name.is_empty() {
            return Err(ScanError::ConfigError(
                "log_dir_name must not be empty".to_string(),
            ));
        }
        if self.version_width == 0 {
            return Err(ScanError::ConfigError(
                "version_width must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
