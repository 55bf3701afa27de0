use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde_json::Value;

/// Locate the most recent change of a column value in a Delta table.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Table root directory (the one holding `_delta_log`)
    pub table_path: PathBuf,

    /// Column identifying the row
    #[arg(long)]
    pub id_column: String,

    /// Key looked up in the id column
    #[arg(long)]
    pub id_value: String,

    /// Column whose value is tracked
    #[arg(long)]
    pub column: String,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Compare ids by type; the id value is parsed as a JSON literal
    #[arg(long)]
    pub exact_id: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Reject log lines without a recognized action
    #[arg(long)]
    pub strict_log: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

impl Cli {
    /// Lookup value as passed to the scanner.
    ///
    /// With `--exact-id`, `42` is the integer 42 and `"42"` the string; input
    /// that is not a JSON literal stays a string.
    pub fn lookup_value(&self) -> Value {
        if self.exact_id {
            serde_json::from_str(&self.id_value)
                .unwrap_or_else(|_| Value::String(self.id_value.clone()))
        } else {
            Value::String(self.id_value.clone())
        }
    }
}
