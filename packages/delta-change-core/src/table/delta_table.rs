//! Filesystem-backed Delta table: history and snapshots replayed from the
//! JSON commit files.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::log::{extract_log_info, parse_commit_version, parse_log, read_commit, FileSet};
use crate::observer::{ScanObserver, TracingObserver};

use super::{HistoryProvider, SnapshotProvider, TableSource, VersionInfo};

const UNKNOWN_OPERATION: &str = "UNKNOWN";

#[derive(Debug, Clone)]
struct Commit {
    info: VersionInfo,
    /// Commit as the scanner sees it, under `strict_log_entries`
    file_set: Result<FileSet, ScanError>,
    /// Number of `DeltaTable::files` entries added up to and including this commit
    files_end: usize,
}

/// A data file added once; re-adding after a remove creates a new entry.
#[derive(Debug, Clone)]
struct FileEntry {
    path: String,
    /// Position in `commits` of the commit that removed the file
    removed_at: Option<usize>,
}

/// A Delta table opened from its log directory.
///
/// Commit files are read and decoded once at open time. Snapshots are
/// replayed from a lenient decoding regardless of `strict_log_entries`, so
/// the strictness policy only decides which versions the scanner skips. A
/// commit that cannot be decoded at all stays in the history with an
/// `UNKNOWN` operation and contributes no file changes.
#[derive(Debug, Clone)]
pub struct DeltaTable {
    root: PathBuf,
    commits: Vec<Commit>,
    /// Every file ever added, in add order
    files: Vec<FileEntry>,
}

impl DeltaTable {
    /// Opens the table rooted at `root`, logging through `tracing`.
    pub fn open(root: impl AsRef<Path>, config: &ScanConfig) -> Result<Self, ScanError> {
        Self::open_with_observer(root, config, &TracingObserver)
    }

    /// Opens the table rooted at `root`.
    ///
    /// # Returns
    /// [`ScanError::TableOpen`] if the root or its log directory cannot be
    /// listed, or if the log holds no commit files.
    pub fn open_with_observer(
        root: impl AsRef<Path>,
        config: &ScanConfig,
        observer: &dyn ScanObserver,
    ) -> Result<Self, ScanError> {
        let root = root.as_ref().to_path_buf();
        let open_error = |reason: String| ScanError::TableOpen {
            path: root.display().to_string(),
            reason,
        };

        if !root.is_dir() {
            return Err(open_error("table root is not a directory".to_string()));
        }

        let log_dir = root.join(&config.log_dir_name);
        let dir_entries = fs::read_dir(&log_dir).map_err(|e| {
            open_error(format!("Failed to list {}: {}", log_dir.display(), e))
        })?;

        let mut versions = Vec::new();
        for entry in dir_entries {
            let entry = entry.map_err(|e| {
                open_error(format!("Failed to list {}: {}", log_dir.display(), e))
            })?;
            let file_name = entry.file_name();
            if let Some(version) = file_name
                .to_str()
                .and_then(|name| parse_commit_version(name, config.version_width))
            {
                versions.push((version, entry.path()));
            }
        }

        if versions.is_empty() {
            return Err(open_error(format!(
                "no commit files in {}",
                log_dir.display()
            )));
        }
        versions.sort_by_key(|(version, _)| *version);

        let mut commits = Vec::with_capacity(versions.len());
        let mut files: Vec<FileEntry> = Vec::new();
        let mut live: HashMap<String, usize> = HashMap::new();

        for (position, (version, path)) in versions.into_iter().enumerate() {
            let (replay, scanned) = decode_commit(&path, config, observer);

            let info = match &replay {
                Ok(file_set) => VersionInfo {
                    version,
                    operation: file_set
                        .operation
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_OPERATION.to_string()),
                    timestamp_ms: file_set
                        .timestamp_ms
                        .unwrap_or_else(|| modified_millis(&path)),
                },
                Err(e) => {
                    tracing::warn!(
                        "Commit {} is unreadable, its file changes are ignored: {}",
                        version,
                        e
                    );
                    VersionInfo {
                        version,
                        operation: UNKNOWN_OPERATION.to_string(),
                        timestamp_ms: modified_millis(&path),
                    }
                }
            };

            if let Ok(file_set) = &replay {
                for removed in &file_set.removed_paths {
                    if let Some(index) = live.remove(removed) {
                        files[index].removed_at = Some(position);
                    }
                }
                for added in &file_set.added_paths {
                    if let Entry::Vacant(slot) = live.entry(added.clone()) {
                        slot.insert(files.len());
                        files.push(FileEntry {
                            path: added.clone(),
                            removed_at: None,
                        });
                    }
                }
            }

            commits.push(Commit {
                info,
                file_set: scanned,
                files_end: files.len(),
            });
        }

        tracing::debug!("Opened table {}", root.display());
        Ok(Self {
            root,
            commits,
            files,
        })
    }

    /// Newest version in the history.
    pub fn latest_version(&self) -> u64 {
        // open() guarantees at least one commit
        self.commits.last().map_or(0, |c| c.info.version)
    }

    /// Number of commits in the history.
    pub fn version_count(&self) -> usize {
        self.commits.len()
    }

    fn position(&self, version: u64) -> Result<usize, ScanError> {
        self.commits
            .binary_search_by_key(&version, |c| c.info.version)
            .map_err(|_| ScanError::VersionNotFound { version })
    }
}

/// Reads a commit once and decodes it twice: leniently for snapshot replay,
/// and under the configured strictness for the scanner.
fn decode_commit(
    path: &Path,
    config: &ScanConfig,
    observer: &dyn ScanObserver,
) -> (Result<FileSet, ScanError>, Result<FileSet, ScanError>) {
    let contents = match read_commit(path, config, observer) {
        Ok(contents) => contents,
        Err(e) => return (Err(e.clone()), Err(e)),
    };
    let source = path.display().to_string();
    let replay = parse_log(&source, contents.lines(), false).map(|e| extract_log_info(&e));
    let scanned = if config.strict_log_entries && replay.is_ok() {
        parse_log(&source, contents.lines(), true).map(|e| extract_log_info(&e))
    } else {
        replay.clone()
    };
    (replay, scanned)
}

fn modified_millis(path: &Path) -> i64 {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

impl HistoryProvider for DeltaTable {
    fn history(&self) -> Result<Vec<VersionInfo>, ScanError> {
        Ok(self.commits.iter().map(|c| c.info.clone()).collect())
    }
}

impl SnapshotProvider for DeltaTable {
    fn active_files(&self, version: u64) -> Result<Vec<String>, ScanError> {
        let position = self.position(version)?;
        let end = self.commits[position].files_end;
        Ok(self.files[..end]
            .iter()
            .filter(|entry| entry.removed_at.map_or(true, |at| at > position))
            .map(|entry| entry.path.clone())
            .collect())
    }
}

impl TableSource for DeltaTable {
    fn root(&self) -> &Path {
        &self.root
    }

    fn file_set(&self, version: u64) -> Result<FileSet, ScanError> {
        let position = self.position(version)?;
        self.commits[position].file_set.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::log_path;
    use ntest::timeout;
    use tempfile::tempdir;

    fn write_commit(root: &Path, version: u64, lines: &[&str]) {
        let path = log_path(root, version, &ScanConfig::default());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, lines.join("\n")).unwrap();
    }

    #[test]
    fn test_open_missing_root() {
        let temp_dir = tempdir().unwrap();
        let err = DeltaTable::open(temp_dir.path().join("absent"), &ScanConfig::default())
            .unwrap_err();
        assert!(matches!(err, ScanError::TableOpen { .. }));
    }

    #[test]
    fn test_open_without_commits() {
        let temp_dir = tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join("_delta_log")).unwrap();
        fs::write(temp_dir.path().join("_delta_log").join("_last_checkpoint"), "{}").unwrap();

        let err = DeltaTable::open(temp_dir.path(), &ScanConfig::default()).unwrap_err();
        assert!(matches!(err, ScanError::TableOpen { .. }));
    }

    #[test]
    fn test_history_is_sorted_oldest_first() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        write_commit(
            root,
            1,
            &[r#"{"commitInfo":{"timestamp":2000,"operation":"MERGE"}}"#],
        );
        write_commit(
            root,
            0,
            &[r#"{"commitInfo":{"timestamp":1000,"operation":"CREATE TABLE"}}"#],
        );

        let table = DeltaTable::open(root, &ScanConfig::default()).unwrap();
        let history = table.history().unwrap();
        assert_eq!(
            history,
            vec![
                VersionInfo {
                    version: 0,
                    operation: "CREATE TABLE".to_string(),
                    timestamp_ms: 1000,
                },
                VersionInfo {
                    version: 1,
                    operation: "MERGE".to_string(),
                    timestamp_ms: 2000,
                },
            ]
        );
        assert_eq!(table.latest_version(), 1);
        assert_eq!(table.version_count(), 2);
        assert_eq!(table.root(), root);
    }

    #[test]
    fn test_active_files_replays_adds_and_removes() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        write_commit(
            root,
            0,
            &[
                r#"{"commitInfo":{"timestamp":1000,"operation":"WRITE"}}"#,
                r#"{"add":{"path":"a.parquet"}}"#,
                r#"{"add":{"path":"b.parquet"}}"#,
            ],
        );
        write_commit(
            root,
            1,
            &[
                r#"{"commitInfo":{"timestamp":2000,"operation":"WRITE"}}"#,
                r#"{"add":{"path":"c.parquet"}}"#,
            ],
        );
        write_commit(
            root,
            2,
            &[
                r#"{"commitInfo":{"timestamp":3000,"operation":"DELETE"}}"#,
                r#"{"remove":{"path":"a.parquet"}}"#,
                r#"{"add":{"path":"d.parquet"}}"#,
            ],
        );

        let table = DeltaTable::open(root, &ScanConfig::default()).unwrap();
        assert_eq!(table.active_files(0).unwrap(), vec!["a.parquet", "b.parquet"]);
        assert_eq!(
            table.active_files(1).unwrap(),
            vec!["a.parquet", "b.parquet", "c.parquet"]
        );
        assert_eq!(
            table.active_files(2).unwrap(),
            vec!["b.parquet", "c.parquet", "d.parquet"]
        );
        assert_eq!(
            table.active_files(9).unwrap_err(),
            ScanError::VersionNotFound { version: 9 }
        );
    }

    #[test]
    fn test_unreadable_commit_stays_in_history() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        write_commit(
            root,
            0,
            &[
                r#"{"commitInfo":{"timestamp":1000,"operation":"WRITE"}}"#,
                r#"{"add":{"path":"a.parquet"}}"#,
            ],
        );
        write_commit(root, 1, &["{broken"]);

        let table = DeltaTable::open(root, &ScanConfig::default()).unwrap();
        let history = table.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].operation, "UNKNOWN");
        assert_eq!(table.active_files(1).unwrap(), vec!["a.parquet"]);
    }

    #[test]
    fn test_strict_mode_does_not_change_snapshots() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        write_commit(
            root,
            0,
            &[
                r#"{"commitInfo":{"timestamp":1000,"operation":"CREATE TABLE"}}"#,
                r#"{"protocol":{"minReaderVersion":1,"minWriterVersion":2}}"#,
                r#"{"metaData":{"id":"t","partitionColumns":[]}}"#,
                r#"{"add":{"path":"a.parquet"}}"#,
            ],
        );
        write_commit(
            root,
            1,
            &[
                r#"{"commitInfo":{"timestamp":2000,"operation":"WRITE"}}"#,
                r#"{"vendorExtension":{"flag":true}}"#,
                r#"{"add":{"path":"b.parquet"}}"#,
            ],
        );

        let config = ScanConfig {
            strict_log_entries: true,
            ..Default::default()
        };
        let table = DeltaTable::open(root, &config).unwrap();

        assert_eq!(
            table.file_set(0).unwrap().added_paths,
            vec!["a.parquet".to_string()]
        );
        assert!(matches!(
            table.file_set(1).unwrap_err(),
            ScanError::MalformedLogEntry { line: 2, .. }
        ));
        assert_eq!(table.history().unwrap()[1].operation, "WRITE");
        assert_eq!(table.active_files(1).unwrap(), vec!["a.parquet", "b.parquet"]);
    }

    #[test]
    fn test_readded_file_moves_to_the_end() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        write_commit(
            root,
            0,
            &[
                r#"{"add":{"path":"a.parquet"}}"#,
                r#"{"add":{"path":"b.parquet"}}"#,
            ],
        );
        write_commit(
            root,
            1,
            &[
                r#"{"remove":{"path":"a.parquet"}}"#,
                r#"{"add":{"path":"b.parquet"}}"#,
            ],
        );
        write_commit(root, 2, &[r#"{"add":{"path":"a.parquet"}}"#]);

        let table = DeltaTable::open(root, &ScanConfig::default()).unwrap();
        assert_eq!(table.active_files(1).unwrap(), vec!["b.parquet"]);
        assert_eq!(table.active_files(2).unwrap(), vec!["b.parquet", "a.parquet"]);
        assert_eq!(
            table.active_files(0).unwrap(),
            vec!["a.parquet", "b.parquet"]
        );
    }

    #[test]
    fn test_file_set_exposes_decoded_commit() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        write_commit(
            root,
            0,
            &[
                r#"{"commitInfo":{"timestamp":1000,"operation":"WRITE","operationParameters":{"mode":"Append"}}}"#,
                r#"{"add":{"path":"a.parquet"}}"#,
            ],
        );

        let table = DeltaTable::open(root, &ScanConfig::default()).unwrap();
        // Deleting the log after open must not affect the decoded commit
        fs::remove_file(log_path(root, 0, &ScanConfig::default())).unwrap();

        let file_set = table.file_set(0).unwrap();
        assert_eq!(file_set.added_paths, vec!["a.parquet".to_string()]);
        assert_eq!(file_set.mode.as_deref(), Some("Append"));
        assert_eq!(
            table.file_set(4).unwrap_err(),
            ScanError::VersionNotFound { version: 4 }
        );
    }

    #[timeout(20000)]
    #[test]
    fn test_snapshots_of_long_append_history() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        let versions = 1000u64;
        for version in 0..versions {
            let add = format!(r#"{{"add":{{"path":"part-{version:05}.parquet"}}}}"#);
            let mut lines = vec![add];
            if version % 10 == 9 {
                lines.push(format!(
                    r#"{{"remove":{{"path":"part-{:05}.parquet"}}}}"#,
                    version - 9
                ));
            }
            let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
            write_commit(root, version, &lines);
        }

        let table = DeltaTable::open(root, &ScanConfig::default()).unwrap();
        for version in (0..versions).rev() {
            let removed = (version + 1) / 10;
            let files = table.active_files(version).unwrap();
            assert_eq!(files.len() as u64, version + 1 - removed);
        }
        let newest = table.active_files(versions - 1).unwrap();
        assert_eq!(newest.first().map(String::as_str), Some("part-00001.parquet"));
        assert_eq!(newest.last().map(String::as_str), Some("part-00999.parquet"));
    }
}
