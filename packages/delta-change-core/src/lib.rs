//! Change-point detection over the version history of Delta tables.
//!
//! Given a row key and a column, walks the table's commit history from the
//! newest version backwards and reports the most recent version where the
//! column's value changed, with the provenance of both sides of the change.

pub mod config;
pub mod detector;
pub mod error;
pub mod log;
pub mod observer;
pub mod reader;
pub mod report;
pub mod resolver;
pub mod scanner;
pub mod table;

#[cfg(test)]
mod testing;

pub use config::ScanConfig;
pub use detector::{detect_changes, ChangeDetector};
pub use error::ScanError;
pub use report::{ChangeRecord, ScanReport, ScanResult};
pub use scanner::{ChangeScanner, ScanRequest};
