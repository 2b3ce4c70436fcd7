//! Decode, flatten and load one dump stream
//!
//! Each stream gets its own reader and executor. Records are pulled one at a
//! time, flattened, and submitted; the executor is closed on every exit path
//! so rows already buffered when a stream stops are still flushed.

use std::io::BufRead;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dump::{
    read_artists, read_labels, read_masters, read_releases, DecodeError, DumpReader, DumpRecord,
    EntityKind,
};
use crate::executor::{BatchConfig, BatchExecutor, LoadError};
use crate::rows::{Flatten, RowInsert};
use crate::storage::BatchWriter;

/// Records between progress log lines
const PROGRESS_INTERVAL: u64 = 100_000;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("load failed: {0}")]
    Load(#[from] LoadError),
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub batch: BatchConfig,
    /// Checked between records, never inside one
    pub cancel: Option<CancellationToken>,
}

/// Outcome of a stream that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub kind: EntityKind,
    pub records: u64,
    pub rows: u64,
    pub batches: u64,
    /// Stopped early by the cancellation token
    pub cancelled: bool,
}

pub async fn load_artists<R, W>(
    input: R,
    writer: W,
    options: &PipelineOptions,
) -> Result<LoadSummary, PipelineError>
where
    R: BufRead,
    W: BatchWriter,
{
    load_records(read_artists(input), writer, options).await
}

pub async fn load_releases<R, W>(
    input: R,
    writer: W,
    options: &PipelineOptions,
) -> Result<LoadSummary, PipelineError>
where
    R: BufRead,
    W: BatchWriter,
{
    load_records(read_releases(input), writer, options).await
}

pub async fn load_masters<R, W>(
    input: R,
    writer: W,
    options: &PipelineOptions,
) -> Result<LoadSummary, PipelineError>
where
    R: BufRead,
    W: BatchWriter,
{
    load_records(read_masters(input), writer, options).await
}

pub async fn load_labels<R, W>(
    input: R,
    writer: W,
    options: &PipelineOptions,
) -> Result<LoadSummary, PipelineError>
where
    R: BufRead,
    W: BatchWriter,
{
    load_records(read_labels(input), writer, options).await
}

/// Load a stream whose kind is given by the caller
pub async fn load<R, W>(
    kind: EntityKind,
    input: R,
    writer: W,
    options: &PipelineOptions,
) -> Result<LoadSummary, PipelineError>
where
    R: BufRead,
    W: BatchWriter,
{
    match kind {
        EntityKind::Artist => load_artists(input, writer, options).await,
        EntityKind::Release => load_releases(input, writer, options).await,
        EntityKind::Master => load_masters(input, writer, options).await,
        EntityKind::Label => load_labels(input, writer, options).await,
    }
}

/// Drive `reader` to completion through a fresh executor
pub async fn load_records<R, T, W>(
    mut reader: DumpReader<R, T>,
    writer: W,
    options: &PipelineOptions,
) -> Result<LoadSummary, PipelineError>
where
    R: BufRead,
    T: DumpRecord + Flatten,
    W: BatchWriter,
{
    let mut executor = BatchExecutor::new(writer, options.batch)?;

    let driven = drive(&mut reader, &mut executor, options.cancel.as_ref()).await;
    let closed = executor.close().await;

    match (driven, closed) {
        (Ok(cancelled), Ok(stats)) => Ok(LoadSummary {
            kind: T::KIND,
            records: reader.records(),
            rows: stats.rows,
            batches: stats.batches,
            cancelled,
        }),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(stats)) => {
            info!(
                kind = %T::KIND,
                records = reader.records(),
                rows = stats.rows,
                "Flushed rows buffered before the failure"
            );
            Err(e)
        },
        (Err(e), Err(close_error)) => {
            match close_error {
                LoadError::Abandoned { .. } => debug!(error = %close_error, "Executor closed after failure"),
                _ => warn!(error = %close_error, "Closing the executor failed as well"),
            }
            Err(e)
        },
    }
}

/// Returns whether the stream was cancelled before its end
async fn drive<R, T, W>(
    reader: &mut DumpReader<R, T>,
    executor: &mut BatchExecutor<W>,
    cancel: Option<&CancellationToken>,
) -> Result<bool, PipelineError>
where
    R: BufRead,
    T: DumpRecord + Flatten,
    W: BatchWriter,
{
    let mut rows: Vec<RowInsert> = Vec::new();

    loop {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            info!(kind = %T::KIND, records = reader.records(), "Load cancelled");
            return Ok(true);
        }

        let Some(record) = reader.next() else {
            return Ok(false);
        };
        let record = record?;

        record.flatten_into(&mut rows);
        executor.submit_all(rows.drain(..)).await?;

        let records = reader.records();
        if records % PROGRESS_INTERVAL == 0 {
            info!(
                kind = %T::KIND,
                records,
                rows = executor.stats().rows,
                offset = reader.offset(),
                "Progress"
            );
        }
    }
}
