//! Top-level entry point: open a table, scan it, and always come back with a
//! structured report.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use serde_json::Value;

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::observer::{ScanObserver, TracingObserver};
use crate::reader::{ColumnReader, ParquetColumnReader};
use crate::report::{ScanReport, ScanResult};
use crate::scanner::{ChangeScanner, ScanRequest};
use crate::table::DeltaTable;

/// Change detector over Delta tables on the local filesystem.
pub struct ChangeDetector {
    config: ScanConfig,
    reader: Box<dyn ColumnReader>,
    observer: Box<dyn ScanObserver>,
}

impl ChangeDetector {
    /// Creates a detector reading Parquet data files and logging via `tracing`.
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            reader: Box::new(ParquetColumnReader::new()),
            observer: Box::new(TracingObserver),
        }
    }

    /// Replaces the data file reader.
    pub fn with_reader(mut self, reader: impl ColumnReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    /// Replaces the progress observer.
    pub fn with_observer(mut self, observer: impl ScanObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Opens the table at `table_path` and scans it.
    ///
    /// # Returns
    /// [`ScanError::TableOpen`] if the table cannot be opened, or any error
    /// that aborted the scan.
    pub fn try_detect(
        &self,
        table_path: &Path,
        request: &ScanRequest,
    ) -> Result<ScanResult, ScanError> {
        let table =
            DeltaTable::open_with_observer(table_path, &self.config, self.observer.as_ref())?;
        ChangeScanner::new(
            &table,
            self.reader.as_ref(),
            self.observer.as_ref(),
            &self.config,
        )
        .scan(request)
    }

    /// Opens and scans the table, converting every failure, panics included,
    /// into an error report.
    pub fn detect(&self, table_path: impl AsRef<Path>, request: &ScanRequest) -> ScanReport {
        let table_path = table_path.as_ref();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.try_detect(table_path, request)
        }));

        let error = match outcome {
            Ok(Ok(result)) => return ScanReport::from(result),
            Ok(Err(e)) => e,
            Err(panic) => {
                let panic_msg = if let Some(msg) = panic.downcast_ref::<&str>() {
                    msg.to_string()
                } else if let Some(msg) = panic.downcast_ref::<String>() {
                    msg.clone()
                } else {
                    "unknown panic".to_string()
                };
                ScanError::Unexpected(panic_msg)
            }
        };

        self.observer.scan_failed(&error);
        ScanReport::from_error(&error)
    }
}

/// Finds the most recent change of `column` for the row where
/// `id_column = id_value`, using the default reader and observer.
pub fn detect_changes(
    table_path: impl AsRef<Path>,
    id_column: &str,
    column: &str,
    id_value: impl Into<Value>,
    config: ScanConfig,
) -> ScanReport {
    let request = ScanRequest::new(id_column, id_value, column);
    ChangeDetector::new(config).detect(table_path, &request)
}
