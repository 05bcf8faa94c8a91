mod config;
mod core;
mod error;
mod features;
mod model;
mod notifications;
mod signals;
mod source;
mod trainer;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::core::pipeline::{run_detection, scan_files};
use crate::core::snapshot::{json_files, load_snapshot};
use crate::error::{DetectorError, Result};
use crate::model::store::ModelArtifacts;
use crate::notifications::Notifier;
use crate::signals::RuleEngine;
use crate::source::{SensorFeed, archive_snapshot};

#[derive(Debug, Parser)]
#[command(name = "railwatch", version, about = "Railway sensor snapshot anomaly detector")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fit the outlier model on all historical snapshots and persist it
    Train,
    /// Print a NORMAL/ANOMALY verdict line for every snapshot file in a directory
    Scan {
        /// Directory to scan (defaults to the configured data directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Evaluate one snapshot with the rule engine and the outlier model
    Detect {
        /// Snapshot file to evaluate instead of fetching from the sensor feed
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("railwatch=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config);
    tracing::debug!("Config: {:?}", config);

    let result = match cli.command {
        Command::Train => run_train(&config),
        Command::Scan { dir } => run_scan(&config, dir),
        Command::Detect { file } => run_detect(&config, file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run_train(config: &Config) -> Result<()> {
    let report = trainer::train(config)?;
    tracing::info!(
        files = report.files_loaded,
        records = report.records,
        skipped = report.files_skipped.len(),
        rows = report.rows,
        columns = report.columns,
        flagged = report.flagged_rows,
        "Training complete"
    );
    println!("Saved model -> {}", report.model_path.display());
    println!("Saved model columns -> {}", report.columns_path.display());
    Ok(())
}

fn run_scan(config: &Config, dir: Option<PathBuf>) -> Result<()> {
    let artifacts = ModelArtifacts::load(&config.paths.models_dir)?;
    let dir = dir.unwrap_or_else(|| config.paths.data_dir.clone());
    let files = json_files(&dir)?;
    if files.is_empty() {
        tracing::info!("No snapshot files in {}", dir.display());
        return Ok(());
    }

    for verdict in scan_files(&files, &artifacts.schema, &artifacts.model)? {
        println!("{verdict}");
    }
    Ok(())
}

fn run_detect(config: &Config, file: Option<PathBuf>) -> Result<()> {
    // Artifacts first: a missing or mismatched model is a startup failure.
    let artifacts = ModelArtifacts::load(&config.paths.models_dir)?;
    let now = Utc::now();

    let snapshot = match file {
        Some(path) => load_snapshot(&path)?,
        None => {
            let feed = SensorFeed::from_config(&config.source);
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| DetectorError::io("tokio runtime", e))?;
            let mut snapshot = rt.block_on(feed.fetch(now))?;
            if snapshot.records.is_empty() {
                tracing::info!("No sensor rows found.");
                return Ok(());
            }
            let path = archive_snapshot(&mut snapshot, &config.paths.data_dir, now)?;
            tracing::info!("Saved snapshot {}", path.display());
            snapshot
        }
    };

    let outcome = run_detection(
        &snapshot,
        &artifacts.schema,
        &artifacts.model,
        &RuleEngine::new(),
        &config.notifications.subject,
        now,
    )?;

    tracing::info!(
        source = %outcome.source,
        rules = outcome.rule_alerts.len(),
        label = %outcome.verdict.label,
        score = outcome.verdict.score,
        "Detection complete"
    );

    if let Some(alert) = &outcome.alert {
        println!("Alert sent:\n{}", alert.body);
        Notifier::new(&config.notifications).notify(alert);
    }
    Ok(())
}
