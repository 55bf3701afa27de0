//! Table history and snapshot collaborators.

mod delta_table;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::log::FileSet;

pub use delta_table::DeltaTable;

/// One commit of the table history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Commit version
    pub version: u64,
    /// Operation name, e.g. "WRITE" or "MERGE"
    pub operation: String,
    /// Commit timestamp in milliseconds since the epoch
    pub timestamp_ms: i64,
}

/// Supplies the ordered version history of a table.
pub trait HistoryProvider {
    /// Returns every known version, oldest first.
    fn history(&self) -> Result<Vec<VersionInfo>, ScanError>;
}

/// Supplies the data files live at a given version.
pub trait SnapshotProvider {
    /// Returns the table-relative data file paths live at `version`, in the
    /// order they were added.
    fn active_files(&self, version: u64) -> Result<Vec<String>, ScanError>;
}

/// A table the scanner can walk: a root directory plus both collaborators.
pub trait TableSource: HistoryProvider + SnapshotProvider {
    /// Table root directory; commit files and relative data paths live under it.
    fn root(&self) -> &Path;

    /// Decoded commit of `version`, or the error that made it unreadable.
    fn file_set(&self, version: u64) -> Result<FileSet, ScanError>;
}
