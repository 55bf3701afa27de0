//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use crate::error::ScanError;
use crate::observer::ScanObserver;
use crate::reader::ColumnReader;

/// Reader serving (id, value) rows from memory, whatever the column names.
#[derive(Debug, Default)]
pub struct MemoryReader {
    files: HashMap<PathBuf, Option<Vec<(Value, Value)>>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, path: impl Into<PathBuf>, rows: &[(Value, Value)]) -> Self {
        self.files.insert(path.into(), Some(rows.to_vec()));
        self
    }

    pub fn with_failure(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.insert(path.into(), None);
        self
    }
}

impl ColumnReader for MemoryReader {
    fn read_columns(&self, path: &Path, _columns: &[&str]) -> Result<Vec<Vec<Value>>, ScanError> {
        match self.files.get(path) {
            Some(Some(rows)) => Ok(vec![
                rows.iter().map(|(id, _)| id.clone()).collect(),
                rows.iter().map(|(_, value)| value.clone()).collect(),
            ]),
            Some(None) => Err(ScanError::FileRead {
                path: path.display().to_string(),
                reason: "corrupt".to_string(),
            }),
            None => Err(ScanError::FileRead {
                path: path.display().to_string(),
                reason: "not found".to_string(),
            }),
        }
    }
}

/// Observer keeping a compact trace of the events it received.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl ScanObserver for RecordingObserver {
    fn version_visited(&self, version: u64) {
        self.push(format!("visit {}", version));
    }

    fn log_read_retry(&self, _path: &Path, attempt: u32, _error: &io::Error) {
        self.push(format!("retry {}", attempt));
    }

    fn log_skipped(&self, version: u64, _error: &ScanError) {
        self.push(format!("log_skipped {}", version));
    }

    fn file_skipped(&self, path: &str, _error: &ScanError) {
        self.push(format!("file_skipped {}", path));
    }

    fn value_missing(&self, version: u64, key_present: bool) {
        if key_present {
            self.push(format!("null {}", version));
        } else {
            self.push(format!("absent {}", version));
        }
    }

    fn baseline_established(&self, version: u64, value: &Value) {
        self.push(format!("baseline {} {}", version, value));
    }

    fn change_found(&self, older: u64, newer: u64) {
        self.push(format!("change {}->{}", older, newer));
    }

    fn scan_failed(&self, error: &ScanError) {
        self.push(format!("failed {}", error));
    }
}
