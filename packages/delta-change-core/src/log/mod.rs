//! Commit file decoding.
//!
//! Each version of a table has one commit file under the log directory,
//! holding one JSON action per line. Only the actions the scanner needs are
//! classified: `add`, `remove` and `commitInfo`. Other actions (`metaData`,
//! `protocol`, `txn`, ...) decode to [`LogEntry::Unclassified`].


use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::observer::ScanObserver;

/// Delta actions that are valid in a commit but carry nothing the scanner
/// needs. Strict decoding accepts them.
pub const PASSIVE_ACTIONS: &[&str] = &[
    "protocol",
    "metaData",
    "txn",
    "cdc",
    "domainMetadata",
    "checkpointMetadata",
    "sidecar",
];

/// One decoded action of a commit file.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    /// Data file added by the commit
    AddFile { path: String },
    /// Data file logically removed by the commit
    RemoveFile { path: String },
    /// Commit provenance
    CommitInfo {
        operation: Option<String>,
        timestamp: Option<i64>,
        operation_parameters: Option<Map<String, Value>>,
    },
    /// Valid action with none of the recognized keys
    Unclassified { keys: Vec<String> },
}

/// Files touched by one version, plus its commit metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    /// Added data file paths, in log order
    pub added_paths: Vec<String>,
    /// Removed data file paths, in log order
    pub removed_paths: Vec<String>,
    /// `operationParameters.mode` of the last commitInfo carrying parameters
    pub mode: Option<String>,
    /// Operation name of the last commitInfo
    pub operation: Option<String>,
    /// Commit timestamp (ms since epoch) of the last commitInfo
    pub timestamp_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct FileAction {
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitInfoAction {
    operation: Option<String>,
    timestamp: Option<i64>,
    operation_parameters: Option<Map<String, Value>>,
}

/// Returns the commit file path for `version`.
pub fn log_path(table_root: &Path, version: u64, config: &ScanConfig) -> PathBuf {
    table_root
        .join(&config.log_dir_name)
        .join(format!("{:0width$}.json", version, width = config.version_width))
}

/// Parses a commit file name (`00000000000000000007.json`) into its version.
///
/// Checkpoints and other files in the log directory yield `None`.
pub fn parse_commit_version(file_name: &str, version_width: usize) -> Option<u64> {
    let stem = file_name.strip_suffix(".json")?;
    if stem.len() != version_width || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Reads the raw text of the commit file at `path`.
///
/// Interrupted or timed-out reads are retried up to `log_read_max_retries`
/// times, each retry reported to `observer`. Any remaining failure is a
/// [`ScanError::LogRead`].
pub fn read_commit(
    path: &Path,
    config: &ScanConfig,
    observer: &dyn ScanObserver,
) -> Result<String, ScanError> {
    read_with_retry(path, config, observer, |p| fs::read_to_string(p))
}

fn read_with_retry<F>(
    path: &Path,
    config: &ScanConfig,
    observer: &dyn ScanObserver,
    mut read: F,
) -> Result<String, ScanError>
where
    F: FnMut(&Path) -> io::Result<String>,
{
    let mut attempt = 0;
    loop {
        let error = match read(path) {
            Ok(contents) => return Ok(contents),
            Err(e) => e,
        };
        let transient = matches!(
            error.kind(),
            ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock
        );
        if !transient || attempt >= config.log_read_max_retries {
            return Err(ScanError::LogRead {
                path: path.display().to_string(),
                reason: error.to_string(),
            });
        }

        attempt += 1;
        observer.log_read_retry(path, attempt, &error);
        if config.log_read_retry_delay_ms > 0 {
            thread::sleep(Duration::from_millis(config.log_read_retry_delay_ms));
        }
    }
}

/// Reads and decodes the commit file at `path`, honouring
/// `strict_log_entries`.
pub fn read_log(
    path: &Path,
    config: &ScanConfig,
    observer: &dyn ScanObserver,
) -> Result<Vec<LogEntry>, ScanError> {
    let contents = read_commit(path, config, observer)?;
    parse_log(
        &path.display().to_string(),
        contents.lines(),
        config.strict_log_entries,
    )
}

/// Reads the commit file at `path` and summarizes it.
pub fn read_file_set(
    path: &Path,
    config: &ScanConfig,
    observer: &dyn ScanObserver,
) -> Result<FileSet, ScanError> {
    read_log(path, config, observer).map(|entries| extract_log_info(&entries))
}

/// Decodes the lines of one commit file. Blank lines are ignored.
///
/// # Arguments
/// * `source` - Name used in error messages
/// * `lines` - Raw lines, in file order
/// * `strict` - Reject lines whose action is neither needed nor one of
///   [`PASSIVE_ACTIONS`]
pub fn parse_log<'a, I>(source: &str, lines: I, strict: bool) -> Result<Vec<LogEntry>, ScanError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut entries = Vec::new();
    for (index, line) in lines.into_iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        decode_line(source, index + 1, line, strict, &mut entries)?;
    }
    Ok(entries)
}

fn decode_line(
    source: &str,
    line_no: usize,
    line: &str,
    strict: bool,
    entries: &mut Vec<LogEntry>,
) -> Result<(), ScanError> {
    let malformed = |reason: String| ScanError::MalformedLogEntry {
        path: source.to_string(),
        line: line_no,
        reason,
    };

    let value: Value = serde_json::from_str(line).map_err(|e| malformed(e.to_string()))?;
    let Value::Object(object) = value else {
        return Err(malformed("expected a JSON object".to_string()));
    };

    let classified = entries.len();

    if let Some(add) = object.get("add") {
        let action = FileAction::deserialize(add)
            .map_err(|e| malformed(format!("invalid add action: {}", e)))?;
        entries.push(LogEntry::AddFile { path: action.path });
    }
    if let Some(remove) = object.get("remove") {
        let action = FileAction::deserialize(remove)
            .map_err(|e| malformed(format!("invalid remove action: {}", e)))?;
        entries.push(LogEntry::RemoveFile { path: action.path });
    }
    if let Some(info) = object.get("commitInfo") {
        let action = CommitInfoAction::deserialize(info)
            .map_err(|e| malformed(format!("invalid commitInfo action: {}", e)))?;
        entries.push(LogEntry::CommitInfo {
            operation: action.operation,
            timestamp: action.timestamp,
            operation_parameters: action.operation_parameters,
        });
    }

    if entries.len() == classified {
        let keys: Vec<String> = object.keys().cloned().collect();
        let passive = keys.iter().any(|k| PASSIVE_ACTIONS.contains(&k.as_str()));
        if strict && !passive {
            return Err(malformed(format!(
                "no recognized action (keys: {})",
                keys.join(", ")
            )));
        }
        entries.push(LogEntry::Unclassified { keys });
    }

    Ok(())
}

/// Summarizes decoded entries into the version's [`FileSet`].
///
/// Every commitInfo carrying `operationParameters` overwrites the mode, so the
/// last one wins even when it has no `mode` key.
pub fn extract_log_info(entries: &[LogEntry]) -> FileSet {
    let mut file_set = FileSet::default();
    for entry in entries {
        match entry {
            LogEntry::AddFile { path } => file_set.added_paths.push(path.clone()),
            LogEntry::RemoveFile { path } => file_set.removed_paths.push(path.clone()),
            LogEntry::CommitInfo {
                operation,
                timestamp,
                operation_parameters,
            } => {
                if let Some(params) = operation_parameters {
                    file_set.mode = params.get("mode").and_then(parameter_string);
                }
                if operation.is_some() {
                    file_set.operation = operation.clone();
                }
                if timestamp.is_some() {
                    file_set.timestamp_ms = *timestamp;
                }
            }
            LogEntry::Unclassified { .. } => {}
        }
    }
    file_set
}

// Writers store parameters as strings, but some emit raw JSON values.
fn parameter_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
