//! Columnar data file reading.

mod parquet_reader;

use std::path::Path;

use serde_json::Value;

use crate::error::ScanError;

pub use parquet_reader::{arrow_value_to_json, ParquetColumnReader};

/// Extracts named columns from a data file.
pub trait ColumnReader: Send + Sync {
    /// Reads `columns` from the file at `path`.
    ///
    /// Returns one vector per requested column, in request order, each holding
    /// the column's values in physical row order. A missing column is a
    /// [`ScanError::ColumnNotFound`]; an unreadable file a
    /// [`ScanError::FileRead`].
    fn read_columns(&self, path: &Path, columns: &[&str]) -> Result<Vec<Vec<Value>>, ScanError>;
}
