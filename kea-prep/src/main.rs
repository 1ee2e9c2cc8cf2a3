//! kea-prep - feature preparation for kea auto-tagging
//!
//! Merges per-track ARFF exports, attaches ground truth and writes the
//! train/test folds. Any fatal error is reported once here and ends the
//! process with a non-zero status.

use anyhow::{Context, Result};
use clap::Parser;
use kea_common::config::{LoggingConfig, TomlConfig};
use kea_common::Reporter;
use kea_prep::cli::Args;
use kea_prep::Pipeline;
use std::fs::OpenOptions;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let begin = Instant::now();
    let args = Args::parse();

    let (toml, config_path) = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    init_tracing(&toml.logging)?;

    info!(
        "Starting kea-prep v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match (&config_path, &args.config) {
        (Some(path), _) => info!("Configuration: {}", path.display()),
        (None, Some(requested)) => warn!(
            "Config file not found: {} (using built-in defaults)",
            requested.display()
        ),
        (None, None) => info!("No configuration file, using built-in defaults"),
    }

    let reporter = Reporter::new(args.reporter_config(&toml));
    let config = args
        .into_pipeline_config(&toml)
        .context("Invalid settings")?;

    reporter.success("Kea classification");
    let summary = Pipeline::new(config, &reporter)
        .run()
        .context("Feature preparation failed")?;

    info!(
        rows = summary.rows_written,
        folds = summary.fold_count,
        warnings = summary.warnings,
        "Dataset ready in {}",
        summary.folds_directory.display()
    );
    println!("Finished in {}ms", kea_common::time::elapsed_millis(begin));
    Ok(())
}
