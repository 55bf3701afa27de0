//! Scan progress reporting.
//!
//! The scanner never logs on its own; it reports through a [`ScanObserver`]
//! handed to it by the caller.

use std::io;
use std::path::Path;

use serde_json::Value;

use crate::error::ScanError;

/// Receives scan progress events. Every method defaults to a no-op.
pub trait ScanObserver: Send + Sync {
    /// A version is about to be inspected.
    fn version_visited(&self, _version: u64) {}

    /// A transient failure reading a commit file; the read is retried.
    fn log_read_retry(&self, _path: &Path, _attempt: u32, _error: &io::Error) {}

    /// A version's commit file could not be read; the version is skipped.
    fn log_skipped(&self, _version: u64, _error: &ScanError) {}

    /// A data file could not be read; resolution continues with the next file.
    fn file_skipped(&self, _path: &str, _error: &ScanError) {}

    /// No row for the key exists at this version, or its value is null.
    fn value_missing(&self, _version: u64, _key_present: bool) {}

    /// The newest value of the column was found.
    fn baseline_established(&self, _version: u64, _value: &Value) {}

    /// The value differs between `older` and `newer`.
    fn change_found(&self, _older: u64, _newer: u64) {}

    /// The scan aborted; the error is returned as a structured report.
    fn scan_failed(&self, _error: &ScanError) {}
}

/// Observer that forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ScanObserver for TracingObserver {
    fn version_visited(&self, version: u64) {
        tracing::debug!("Inspecting version {}", version);
    }

    fn log_read_retry(&self, path: &Path, attempt: u32, error: &io::Error) {
        tracing::warn!(
            "Retrying read of {} (attempt {}): {}",
            path.display(),
            attempt,
            error
        );
    }

    fn log_skipped(&self, version: u64, error: &ScanError) {
        tracing::warn!("Skipping version {}: {}", version, error);
    }

    fn file_skipped(&self, path: &str, error: &ScanError) {
        tracing::warn!("Skipping data file {}: {}", path, error);
    }

    fn value_missing(&self, version: u64, key_present: bool) {
        if key_present {
            tracing::debug!("Key present with null value at version {}", version);
        } else {
            tracing::debug!("Key absent at version {}", version);
        }
    }

    fn baseline_established(&self, version: u64, value: &Value) {
        tracing::debug!("Baseline value {} established at version {}", value, version);
    }

    fn change_found(&self, older: u64, newer: u64) {
        tracing::info!("Value changed between version {} and version {}", older, newer);
    }

    fn scan_failed(&self, error: &ScanError) {
        tracing::error!("Change detection failed: {}", error);
    }
}

/// Observer that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}
