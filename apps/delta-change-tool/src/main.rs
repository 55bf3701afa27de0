//! CLI for locating the most recent change of a column value in a Delta table.
//!
//! Prints the report on stdout; diagnostics go to stderr, filtered by
//! `RUST_LOG` (default `info`).

mod cli;

use anyhow::Context;
use clap::Parser;
use delta_change_core::resolver::IdComparison;
use delta_change_core::{ChangeDetector, ScanConfig, ScanRequest};
use tracing_subscriber::EnvFilter;

use cli::{Cli, OutputFormat};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    tracing::debug!("Scan configuration: {:?}", config);

    let request = ScanRequest::new(&cli.id_column, cli.lookup_value(), &cli.column);
    let report = ChangeDetector::new(config).detect(&cli.table_path, &request);

    match cli.format {
        OutputFormat::Json => println!("{}", report.to_json_pretty()?),
        OutputFormat::Text => println!("{}", report.render_text()),
    }
    Ok(())
}

/// Defaults, then the config file, then `DELTA_CHANGE_*` variables, then flags.
fn load_config(cli: &Cli) -> anyhow::Result<ScanConfig> {
    let mut config = match &cli.config {
        Some(path) => ScanConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScanConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid DELTA_CHANGE_* override")?;

    if cli.exact_id {
        config.id_comparison = IdComparison::Exact;
    }
    if cli.strict_log {
        config.strict_log_entries = true;
    }
    Ok(config)
}
