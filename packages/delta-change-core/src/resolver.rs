//! Row value resolution: find the key's row among a version's data files and
//! read the target column.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ScanError;
use crate::observer::ScanObserver;
use crate::reader::ColumnReader;

/// How a row's id is compared with the lookup value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdComparison {
    /// Compare canonical string forms, so integer `42` matches `"42"`
    #[default]
    StringNormalized,
    /// Compare typed values
    Exact,
}

impl IdComparison {
    /// Returns true if `candidate` matches `lookup`. Null ids never match.
    pub fn matches(self, candidate: &Value, lookup: &Value) -> bool {
        match self {
            IdComparison::StringNormalized => {
                match (canonical_string(candidate), canonical_string(lookup)) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            IdComparison::Exact => !candidate.is_null() && candidate == lookup,
        }
    }
}

impl fmt::Display for IdComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdComparison::StringNormalized => write!(f, "string_normalized"),
            IdComparison::Exact => write!(f, "exact"),
        }
    }
}

impl FromStr for IdComparison {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string_normalized" | "normalized" | "string" => Ok(IdComparison::StringNormalized),
            "exact" | "typed" => Ok(IdComparison::Exact),
            other => Err(ScanError::ConfigError(format!(
                "Invalid id_comparison: {}",
                other
            ))),
        }
    }
}

/// Canonical string form of a value; `None` for null.
pub fn canonical_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Maps a data file path from the log to a filesystem path.
///
/// Log paths are percent-encoded and relative to the table root; absolute
/// paths and `file://` URIs are taken as they are.
pub fn resolve_data_path(table_root: &Path, raw: &str) -> PathBuf {
    let (raw, is_uri) = match raw.strip_prefix("file://") {
        Some(stripped) => (stripped, true),
        None => (raw, false),
    };
    let decoded = percent_decode_str(raw).decode_utf8_lossy().into_owned();
    let candidate = PathBuf::from(decoded);
    if is_uri || candidate.is_absolute() {
        candidate
    } else {
        table_root.join(candidate)
    }
}

/// Resolves a key's column value over the data files of one version.
pub struct RowValueResolver<'a> {
    table_root: &'a Path,
    reader: &'a dyn ColumnReader,
    observer: &'a dyn ScanObserver,
    comparison: IdComparison,
}

impl<'a> RowValueResolver<'a> {
    pub fn new(
        table_root: &'a Path,
        reader: &'a dyn ColumnReader,
        observer: &'a dyn ScanObserver,
        comparison: IdComparison,
    ) -> Self {
        Self {
            table_root,
            reader,
            observer,
            comparison,
        }
    }

    /// Returns the `target_column` value of the first row whose `id_column`
    /// matches `id_value`, searching files in the given order.
    ///
    /// `None` means no row matched. `Some(Value::Null)` means the row exists
    /// but the column is null. Unreadable files are reported to the observer
    /// and skipped.
    pub fn resolve_value(
        &self,
        data_file_paths: &[String],
        id_column: &str,
        id_value: &Value,
        target_column: &str,
    ) -> Option<Value> {
        first_match(data_file_paths, |path| {
            self.resolve_in_file(path, id_column, id_value, target_column)
        })
    }

    fn resolve_in_file(
        &self,
        data_file_path: &str,
        id_column: &str,
        id_value: &Value,
        target_column: &str,
    ) -> Option<Value> {
        let path = resolve_data_path(self.table_root, data_file_path);
        let columns = match self.reader.read_columns(&path, &[id_column, target_column]) {
            Ok(columns) => columns,
            Err(e) => {
                self.observer.file_skipped(data_file_path, &e);
                return None;
            }
        };

        let [ids, targets] = columns.as_slice() else {
            let e = ScanError::FileRead {
                path: path.display().to_string(),
                reason: format!("expected 2 columns, reader returned {}", columns.len()),
            };
            self.observer.file_skipped(data_file_path, &e);
            return None;
        };

        ids.iter()
            .zip(targets)
            .find(|(id, _)| self.comparison.matches(id, id_value))
            .map(|(_, value)| value.clone())
    }
}

#[cfg(not(feature = "parallel"))]
fn first_match<F>(paths: &[String], resolve: F) -> Option<Value>
where
    F: Fn(&String) -> Option<Value>,
{
    paths.iter().find_map(resolve)
}

// Files are read concurrently, but the match from the earliest file wins.
#[cfg(feature = "parallel")]
fn first_match<F>(paths: &[String], resolve: F) -> Option<Value>
where
    F: Fn(&String) -> Option<Value> + Send + Sync,
{
    use rayon::prelude::*;
    paths.par_iter().find_map_first(resolve)
}
