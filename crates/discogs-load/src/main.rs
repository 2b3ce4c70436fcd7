//! discogs-load - load Discogs XML dumps into PostgreSQL

use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use discogs_common::logging::{init_logging, LogConfig, LogLevel};
use discogs_load::config::LoadConfig;
use discogs_load::dump::EntityKind;
use discogs_load::pipeline::{load, PipelineOptions};
use discogs_load::source::open_source;
use discogs_load::storage::{connect, BatchWriter, DryRunWriter, PgBatchWriter};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Conventional exit status after SIGINT
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "discogs-load")]
#[command(author, version, about = "Load Discogs XML dumps into PostgreSQL")]
struct Cli {
    /// Jobs to run in order, e.g. labels=discogs_20240101_labels.xml.gz
    ///
    /// KIND is one of artists, releases, masters, labels. LOCATION is a
    /// local path or an http(s) URL; a .gz suffix is decompressed.
    #[arg(required = true, value_name = "KIND=LOCATION")]
    jobs: Vec<Job>,

    /// Row inserts per commit (overrides DISCOGS_BATCH_SIZE)
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Decode and flatten without writing to the database
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// One dump to load, with its kind given explicitly
#[derive(Debug, Clone, PartialEq, Eq)]
struct Job {
    kind: EntityKind,
    location: String,
}

impl FromStr for Job {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, location) = s
            .split_once('=')
            .ok_or_else(|| format!("expected KIND=LOCATION, got '{}'", s))?;
        let location = location.trim();
        if location.is_empty() {
            return Err(format!("missing location in '{}'", s));
        }
        Ok(Job {
            kind: kind.parse()?,
            location: location.to_string(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("discogs-load")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    let mut config = if cli.dry_run {
        LoadConfig::offline_from_env()?
    } else {
        LoadConfig::from_env()?
    };
    if let Some(capacity) = cli.batch_size {
        config.batch.capacity = capacity;
    }
    config.validate().context("Invalid configuration")?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let options = PipelineOptions {
        batch: config.batch,
        cancel: Some(cancel),
    };

    let tally = if cli.dry_run {
        let mut writer = DryRunWriter::new();
        let tally = run_jobs(&cli.jobs, &config, &options, &mut writer).await;
        for (relation, rows) in writer.row_counts() {
            info!(table = %relation, rows, "Dry run totals");
        }
        tally
    } else {
        let pool = connect(&config.database)
            .await
            .context("Failed to connect to database")?;
        let mut writer = PgBatchWriter::new(pool.clone());
        if let Some(schema) = &config.database.schema {
            writer = writer.with_schema(schema.clone())?;
        }
        let tally = run_jobs(&cli.jobs, &config, &options, &mut writer).await;
        pool.close().await;
        tally
    };

    if tally.failed > 0 {
        error!(failed = tally.failed, jobs = cli.jobs.len(), "Some jobs failed");
        return Ok(ExitCode::FAILURE);
    }

    if tally.interrupted > 0 {
        warn!(
            interrupted = tally.interrupted,
            jobs = cli.jobs.len(),
            "Interrupted before all jobs were loaded"
        );
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }

    info!(completed = tally.completed, "All jobs complete");
    Ok(ExitCode::SUCCESS)
}

/// How the jobs of one run ended
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct JobTally {
    completed: usize,
    failed: usize,
    /// Stopped part way or never started because of an interrupt
    interrupted: usize,
}

/// Run every job in order
///
/// A failed job does not stop the ones after it.
async fn run_jobs<W: BatchWriter>(
    jobs: &[Job],
    config: &LoadConfig,
    options: &PipelineOptions,
    writer: &mut W,
) -> JobTally {
    let mut tally = JobTally::default();

    for job in jobs {
        if options.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            warn!(kind = %job.kind, location = %job.location, "Skipping job after interrupt");
            tally.interrupted += 1;
            continue;
        }

        info!(kind = %job.kind, location = %job.location, "Starting job");

        let input = match open_source(&job.location, &config.source).await {
            Ok(input) => input,
            Err(e) => {
                error!(
                    kind = %job.kind,
                    location = %job.location,
                    error = %format!("{:#}", e),
                    "Failed to open dump"
                );
                tally.failed += 1;
                continue;
            },
        };

        match load(job.kind, input, &mut *writer, options).await {
            Ok(summary) => {
                info!(
                    kind = %summary.kind,
                    records = summary.records,
                    rows = summary.rows,
                    batches = summary.batches,
                    cancelled = summary.cancelled,
                    "Job finished"
                );
                if summary.cancelled {
                    tally.interrupted += 1;
                } else {
                    tally.completed += 1;
                }
            },
            Err(e) => {
                error!(kind = %job.kind, location = %job.location, error = %e, "Job failed");
                tally.failed += 1;
            },
        }
    }

    tally
}

/// Cancel the token on Ctrl+C; jobs stop at the next record boundary
async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    warn!("Interrupt received, stopping after the current record");
    cancel.cancel();
}
