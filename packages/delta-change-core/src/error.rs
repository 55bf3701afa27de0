//! Scan error types.

use thiserror::Error;

/// Errors raised while opening a table or scanning its history.
///
/// A commit read failing with an [`ScanError::is_recoverable`] error skips that
/// version; other errors abort the scan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Table root or log directory missing, unreadable, or empty
    #[error("Failed to open table at '{path}': {reason}")]
    TableOpen { path: String, reason: String },

    /// A version's commit file could not be read
    #[error("Failed to read log file '{path}': {reason}")]
    LogRead { path: String, reason: String },

    /// A commit file line that does not decode into a log entry
    #[error("Malformed log entry in '{path}' at line {line}: {reason}")]
    MalformedLogEntry {
        path: String,
        line: usize,
        reason: String,
    },

    /// A data file could not be opened or decoded
    #[error("Failed to read data file '{path}': {reason}")]
    FileRead { path: String, reason: String },

    /// Data file lacks a requested column
    #[error("Column '{column}' not found in data file '{path}'")]
    ColumnNotFound { path: String, column: String },

    /// Version is not part of the table history
    #[error("Version {version} not found in table history")]
    VersionNotFound { version: u64 },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Anything else, including panics caught at the top level
    #[error("{0}")]
    Unexpected(String),
}

impl ScanError {
    /// Returns true for errors scoped to a single version or data file.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScanError::LogRead { .. }
                | ScanError::MalformedLogEntry { .. }
                | ScanError::FileRead { .. }
                | ScanError::ColumnNotFound { .. }
        )
    }
}
