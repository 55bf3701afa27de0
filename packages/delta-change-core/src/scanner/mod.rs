//! Change-point scanner.
//!
//! Walks the table history from the newest version to the oldest, resolving
//! the key's column value at each version, and stops at the first version
//! whose value differs from the newest one.


use std::path::PathBuf;

use serde_json::Value;

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::log::{self, FileSet};
use crate::observer::ScanObserver;
use crate::reader::ColumnReader;
use crate::report::{format_timestamp, ChangeRecord, ScanResult};
use crate::resolver::RowValueResolver;
use crate::table::{TableSource, VersionInfo};

/// Lookup parameters of one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    /// Column identifying the row
    pub id_column: String,
    /// Key looked up in `id_column`
    pub id_value: Value,
    /// Column whose value is tracked
    pub target_column: String,
}

impl ScanRequest {
    pub fn new(
        id_column: impl Into<String>,
        id_value: impl Into<Value>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            id_column: id_column.into(),
            id_value: id_value.into(),
            target_column: target_column.into(),
        }
    }
}

/// A version whose commit file was read, kept to build change records.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitedVersion {
    pub info: VersionInfo,
    pub log_path: PathBuf,
    pub file_set: FileSet,
}

/// Accumulator of the backward walk.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanState {
    /// No value seen yet; `key_seen` is set once a row matched with a null value
    Scanning { key_seen: bool },
    /// Newest value known. `holder` is the oldest version seen so far holding it.
    ValueEstablished {
        baseline: Value,
        holder: VisitedVersion,
    },
    /// Transition located; the walk stops
    ChangeFound { records: Vec<ChangeRecord> },
}

impl ScanState {
    /// Closes the walk and maps the state to its result.
    ///
    /// A walk ending in `Scanning` without ever matching the key is the
    /// key-not-found outcome.
    pub fn finish(self, request: &ScanRequest) -> ScanResult {
        match self {
            ScanState::Scanning { key_seen: false } => ScanResult::NotFound {
                id_column: request.id_column.clone(),
                id_value: request.id_value.clone(),
            },
            ScanState::Scanning { key_seen: true } | ScanState::ValueEstablished { .. } => {
                ScanResult::NoChange {
                    column: request.target_column.clone(),
                    id_column: request.id_column.clone(),
                    id_value: request.id_value.clone(),
                }
            }
            ScanState::ChangeFound { records } => ScanResult::Changed { records },
        }
    }
}

/// Locates the most recent change of a column value for one key.
pub struct ChangeScanner<'a> {
    table: &'a dyn TableSource,
    reader: &'a dyn ColumnReader,
    observer: &'a dyn ScanObserver,
    config: &'a ScanConfig,
}

impl<'a> ChangeScanner<'a> {
    pub fn new(
        table: &'a dyn TableSource,
        reader: &'a dyn ColumnReader,
        observer: &'a dyn ScanObserver,
        config: &'a ScanConfig,
    ) -> Self {
        Self {
            table,
            reader,
            observer,
            config,
        }
    }

    /// Runs the backward walk.
    ///
    /// Commits the table could not decode skip their version and unreadable
    /// data files are skipped during resolution. Failures of the history or
    /// snapshot providers abort the scan.
    pub fn scan(&self, request: &ScanRequest) -> Result<ScanResult, ScanError> {
        let history = self.table.history()?;
        let root = self.table.root();
        let resolver =
            RowValueResolver::new(root, self.reader, self.observer, self.config.id_comparison);

        let mut state = ScanState::Scanning { key_seen: false };
        for info in history.into_iter().rev() {
            self.observer.version_visited(info.version);

            let file_set = match self.table.file_set(info.version) {
                Ok(file_set) => file_set,
                Err(e) if e.is_recoverable() => {
                    self.observer.log_skipped(info.version, &e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let files = self.table.active_files(info.version)?;
            let resolved = resolver.resolve_value(
                &files,
                &request.id_column,
                &request.id_value,
                &request.target_column,
            );

            let visited = VisitedVersion {
                log_path: log::log_path(root, info.version, self.config),
                info,
                file_set,
            };
            state = self.advance(state, request, visited, resolved);
            if matches!(state, ScanState::ChangeFound { .. }) {
                break;
            }
        }

        Ok(state.finish(request))
    }

    /// Applies the value resolved at `visited` to the walk state.
    pub fn advance(
        &self,
        state: ScanState,
        request: &ScanRequest,
        visited: VisitedVersion,
        resolved: Option<Value>,
    ) -> ScanState {
        let version = visited.info.version;
        let value = match resolved {
            None => {
                self.observer.value_missing(version, false);
                return state;
            }
            Some(Value::Null) => {
                self.observer.value_missing(version, true);
                return match state {
                    ScanState::Scanning { .. } => ScanState::Scanning { key_seen: true },
                    other => other,
                };
            }
            Some(value) => value,
        };

        match state {
            ScanState::Scanning { .. } => {
                self.observer.baseline_established(version, &value);
                ScanState::ValueEstablished {
                    baseline: value,
                    holder: visited,
                }
            }
            ScanState::ValueEstablished { baseline, .. } if value == baseline => {
                ScanState::ValueEstablished {
                    baseline,
                    holder: visited,
                }
            }
            ScanState::ValueEstablished { baseline, holder } => {
                self.observer.change_found(version, holder.info.version);
                let original =
                    self.build_record(request, &visited, true, value.clone(), Value::Null);
                let modified = self.build_record(request, &holder, false, value, baseline);
                ScanState::ChangeFound {
                    records: vec![original, modified],
                }
            }
            found @ ScanState::ChangeFound { .. } => found,
        }
    }

    fn build_record(
        &self,
        request: &ScanRequest,
        visited: &VisitedVersion,
        is_original: bool,
        old_value: Value,
        new_value: Value,
    ) -> ChangeRecord {
        ChangeRecord {
            id_column: request.id_column.clone(),
            is_original,
            is_modified: !is_original,
            old_value,
            new_value,
            data_file_path: visited.file_set.added_paths.first().cloned(),
            log_path: visited.log_path.display().to_string(),
            operation: visited.info.operation.clone(),
            mode: visited.file_set.mode.clone(),
            timestamp: format_timestamp(visited.info.timestamp_ms, &self.config.timestamp_format),
            version: visited.info.version,
        }
    }
}
