//! Discogs Load Library
//!
//! Streams Discogs catalog dumps (artists, releases, masters, labels) into
//! normalized relational tables.
//!
//! # Pipeline
//!
//! - **dump**: lazy decoder turning a dump's byte stream into typed records
//! - **rows**: flattens a record into ordered row inserts with ordinals
//! - **executor**: buffers row inserts and commits them in fixed-size batches
//! - **storage**: the batch write seam and its PostgreSQL implementation
//! - **pipeline**: ties the three together for one stream
//!
//! # Example
//!
//! ```no_run
//! use discogs_load::config::LoadConfig;
//! use discogs_load::dump::EntityKind;
//! use discogs_load::pipeline::{load, PipelineOptions};
//! use discogs_load::source::open_source;
//! use discogs_load::storage::{connect, PgBatchWriter};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = LoadConfig::from_env()?;
//!     let mut writer = PgBatchWriter::new(connect(&config.database).await?);
//!
//!     let input = open_source("discogs_20240101_labels.xml.gz", &config.source).await?;
//!     let options = PipelineOptions { batch: config.batch, cancel: None };
//!     let summary = load(EntityKind::Label, input, &mut writer, &options).await?;
//!     println!("{} labels, {} rows", summary.records, summary.rows);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod dump;
pub mod executor;
pub mod pipeline;
pub mod rows;
pub mod source;
pub mod storage;

pub use dump::{DecodeError, EntityKind};
pub use executor::{BatchConfig, BatchExecutor, LoadError};
pub use pipeline::{LoadSummary, PipelineError, PipelineOptions};
pub use rows::{Flatten, Relation, RowInsert};
pub use storage::{BatchWriter, StorageError};
