//! Scan results and their external shapes.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ScanError;
use crate::resolver::canonical_string;

/// One side of a detected change.
///
/// Serialized field names follow the detector's established JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id_column: String,
    /// Version holding the value before the change
    #[serde(rename = "original_record")]
    pub is_original: bool,
    /// Version where the new value first appears
    #[serde(rename = "modified_record")]
    pub is_modified: bool,
    pub old_value: Value,
    /// Null on the original record
    pub new_value: Value,
    /// First data file added by the version, if any
    #[serde(rename = "parquet_file_path")]
    pub data_file_path: Option<String>,
    #[serde(rename = "delta_log_path")]
    pub log_path: String,
    pub operation: String,
    pub mode: Option<String>,
    pub timestamp: String,
    pub version: u64,
}

/// Terminal outcome of a scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanResult {
    /// No version holds a row for the key
    NotFound { id_column: String, id_value: Value },
    /// The key exists but the column never changed
    NoChange {
        column: String,
        id_column: String,
        id_value: Value,
    },
    /// Records of the most recent change, oldest first
    Changed { records: Vec<ChangeRecord> },
}

/// External representation of a scan: `{"error": ..}`, `{"info": ..}` or the
/// list of change records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScanReport {
    Error { error: String },
    Info { info: String },
    Records(Vec<ChangeRecord>),
}

impl From<ScanResult> for ScanReport {
    fn from(result: ScanResult) -> Self {
        match result {
            ScanResult::NotFound {
                id_column,
                id_value,
            } => ScanReport::Error {
                error: format!(
                    "No records found matching {} = {}",
                    id_column,
                    display_value(&id_value)
                ),
            },
            ScanResult::NoChange {
                column,
                id_column,
                id_value,
            } => ScanReport::Info {
                info: format!(
                    "No changes detected for {} where {} = {}",
                    column,
                    id_column,
                    display_value(&id_value)
                ),
            },
            ScanResult::Changed { records } => ScanReport::Records(records),
        }
    }
}

impl ScanReport {
    /// Report for a scan that aborted.
    pub fn from_error(error: &ScanError) -> Self {
        ScanReport::Error {
            error: format!("An error occurred: {}", error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ScanReport::Error { .. })
    }

    /// Change records, empty unless a change was found.
    pub fn records(&self) -> &[ChangeRecord] {
        match self {
            ScanReport::Records(records) => records,
            _ => &[],
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, ScanError> {
        serde_json::to_string_pretty(self).map_err(|e| ScanError::SerializationError(e.to_string()))
    }

    /// Human-readable rendering of the same data.
    pub fn render_text(&self) -> String {
        match self {
            ScanReport::Error { error } => format!("error: {}", error),
            ScanReport::Info { info } => info.clone(),
            ScanReport::Records(records) => {
                let mut lines = Vec::new();
                for record in records {
                    let kind = if record.is_original { "original" } else { "modified" };
                    let mode = record
                        .mode
                        .as_ref()
                        .map(|m| format!(", mode {}", m))
                        .unwrap_or_default();
                    lines.push(format!(
                        "[{}] version {} at {} ({}{})",
                        kind, record.version, record.timestamp, record.operation, mode
                    ));
                    if record.is_modified {
                        lines.push(format!(
                            "  value: {} -> {}",
                            record.old_value, record.new_value
                        ));
                    } else {
                        lines.push(format!("  value: {}", record.old_value));
                    }
                    lines.push(format!("  log:  {}", record.log_path));
                    if let Some(path) = &record.data_file_path {
                        lines.push(format!("  file: {}", path));
                    }
                }
                lines.join("\n")
            }
        }
    }
}

fn display_value(value: &Value) -> String {
    canonical_string(value).unwrap_or_else(|| "null".to_string())
}

/// Formats a millisecond timestamp in UTC.
///
/// Falls back to RFC 3339 when `format` is not a valid chrono format string,
/// and to the raw number when the timestamp is out of range.
pub fn format_timestamp(timestamp_ms: i64, format: &str) -> String {
    let Some(datetime) = DateTime::<Utc>::from_timestamp_millis(timestamp_ms) else {
        return timestamp_ms.to_string();
    };
    let mut out = String::new();
    if write!(out, "{}", datetime.format(format)).is_err() {
        return datetime.to_rfc3339();
    }
    out
}
