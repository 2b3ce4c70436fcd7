//! Batched load executor
//!
//! Buffers row inserts and hands them to a [`BatchWriter`] in groups of a
//! fixed capacity. Each group is one atomic write; there is no transaction
//! spanning groups, so rows from batches committed before a failure stay
//! persisted.
//!
//! ```text
//! Open -> Accumulating -> Committing -> Accumulating -> ... -> Closing -> Closed
//!                              |                                  |
//!                              +-> Failed -> Closed    Failed <---+
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::rows::{RowInsert, RowKey};
use crate::storage::{BatchWriter, StorageError};

/// Rows per commit when nothing else is configured
pub const DEFAULT_BATCH_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Row inserts per commit group
    pub capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BATCH_CAPACITY,
        }
    }
}

impl BatchConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("batch {batch} ({} rows) failed to commit: {source}", .keys.len())]
    Commit {
        /// Zero-based number of the failing batch
        batch: u64,
        /// Every row of the failing batch, in submission order
        keys: Vec<RowKey>,
        #[source]
        source: StorageError,
    },

    #[error("load abandoned after batch {batch} failed to commit")]
    Abandoned { batch: u64 },

    #[error("batch capacity must be at least 1")]
    InvalidCapacity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// Nothing submitted yet
    Open,
    Accumulating,
    /// A batch write is in flight
    Committing,
    /// `close` is flushing the trailing partial batch
    Closing,
    /// A commit failed; nothing more will be written
    Failed,
    Closed,
}

/// Work committed so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub batches: u64,
    pub rows: u64,
}

/// Sink for row inserts that owns the batch boundary
///
/// `close` must be called on every exit path to flush the trailing partial
/// batch; it consumes the executor, so nothing can be submitted afterwards.
pub struct BatchExecutor<W: BatchWriter> {
    writer: W,
    capacity: usize,
    pending: Vec<RowInsert>,
    state: ExecutorState,
    stats: LoadStats,
    failed_batch: Option<u64>,
}

impl<W: BatchWriter> BatchExecutor<W> {
    pub fn new(writer: W, config: BatchConfig) -> Result<Self, LoadError> {
        if config.capacity == 0 {
            return Err(LoadError::InvalidCapacity);
        }

        Ok(Self {
            writer,
            capacity: config.capacity,
            pending: Vec::with_capacity(config.capacity),
            state: ExecutorState::Open,
            stats: LoadStats::default(),
            failed_batch: None,
        })
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }

    /// Rows buffered but not yet committed
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Buffer one row, committing the buffer once it reaches capacity
    pub async fn submit(&mut self, row: RowInsert) -> Result<(), LoadError> {
        if let Some(batch) = self.failed_batch {
            return Err(LoadError::Abandoned { batch });
        }

        self.pending.push(row);
        self.state = ExecutorState::Accumulating;

        if self.pending.len() >= self.capacity {
            self.commit().await?;
        }
        Ok(())
    }

    pub async fn submit_all<I>(&mut self, rows: I) -> Result<(), LoadError>
    where
        I: IntoIterator<Item = RowInsert>,
    {
        for row in rows {
            self.submit(row).await?;
        }
        Ok(())
    }

    /// Flush any partial batch and finish
    ///
    /// Closing with nothing pending writes nothing. Closing after a failed
    /// commit writes nothing and reports the abandonment.
    pub async fn close(mut self) -> Result<LoadStats, LoadError> {
        if let Some(batch) = self.failed_batch {
            self.state = ExecutorState::Closed;
            return Err(LoadError::Abandoned { batch });
        }

        self.state = ExecutorState::Closing;
        if !self.pending.is_empty() {
            self.commit().await?;
        }

        self.state = ExecutorState::Closed;
        debug!(
            batches = self.stats.batches,
            rows = self.stats.rows,
            "Load executor closed"
        );
        Ok(self.stats)
    }

    async fn commit(&mut self) -> Result<(), LoadError> {
        let batch = self.stats.batches;
        let rows = self.pending.len();
        let closing = self.state == ExecutorState::Closing;
        if !closing {
            self.state = ExecutorState::Committing;
        }

        match self.writer.write_batch(&self.pending).await {
            Ok(()) => {
                self.pending.clear();
                self.stats.batches += 1;
                self.stats.rows += rows as u64;
                if !closing {
                    self.state = ExecutorState::Accumulating;
                }
                debug!(batch, rows, closing, "Committed batch");
                Ok(())
            },
            Err(source) => {
                let keys: Vec<RowKey> = self.pending.drain(..).map(|row| row.key).collect();
                self.state = ExecutorState::Failed;
                self.failed_batch = Some(batch);
                error!(
                    batch,
                    rows,
                    first = ?keys.first(),
                    error = %source,
                    "Batch commit failed"
                );
                Err(LoadError::Commit {
                    batch,
                    keys,
                    source,
                })
            },
        }
    }
}

impl<W: BatchWriter> Drop for BatchExecutor<W> {
    fn drop(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        match self.state {
            ExecutorState::Closing => warn!(
                rows = self.pending.len(),
                "Close interrupted during the final flush; trailing rows may not be written"
            ),
            ExecutorState::Closed | ExecutorState::Failed => {},
            _ => warn!(
                rows = self.pending.len(),
                "Load executor dropped without close; buffered rows were not written"
            ),
        }
    }
}
