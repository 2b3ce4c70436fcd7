//! Shared helpers for discogs-load integration tests

#![allow(dead_code)]

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use async_trait::async_trait;
use discogs_load::rows::{Relation, RowInsert};
use discogs_load::storage::{BatchWriter, StorageError};

pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("discogs")
}

pub fn open_fixture(name: &str) -> BufReader<File> {
    let path = fixture_path().join(name);
    BufReader::new(File::open(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e)))
}

/// In-memory writer keeping every committed batch
#[derive(Debug, Default)]
pub struct RecordingWriter {
    pub batches: Vec<Vec<RowInsert>>,
    /// Zero-based write call that fails instead of committing
    pub fail_on: Option<usize>,
    calls: usize,
}

impl RecordingWriter {
    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on: Some(call),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn rows(&self) -> impl Iterator<Item = &RowInsert> {
        self.batches.iter().flatten()
    }

    pub fn rows_for(&self, relation: Relation) -> Vec<&RowInsert> {
        self.rows().filter(|row| row.relation == relation).collect()
    }
}

#[async_trait]
impl BatchWriter for RecordingWriter {
    async fn write_batch(&mut self, rows: &[RowInsert]) -> Result<(), StorageError> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on == Some(call) {
            return Err(StorageError::Rejected(format!(
                "simulated failure on write {}",
                call
            )));
        }
        self.batches.push(rows.to_vec());
        Ok(())
    }
}
