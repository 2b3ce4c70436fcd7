//! Storage seam for batched row writes
//!
//! [`BatchWriter`] is the only thing the load executor talks to. One
//! `write_batch` call is one atomic unit: either every row in the slice is
//! persisted or none is.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::rows::{Relation, RowInsert, Value};

/// PostgreSQL caps a statement at 65535 bind parameters
const MAX_BIND_PARAMS: usize = 65_535;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("batch rejected: {0}")]
    Rejected(String),
}

/// Writes one batch of rows as a single atomic unit
#[async_trait]
pub trait BatchWriter: Send {
    async fn write_batch(&mut self, rows: &[RowInsert]) -> Result<(), StorageError>;
}

#[async_trait]
impl<W: BatchWriter + ?Sized> BatchWriter for &mut W {
    async fn write_batch(&mut self, rows: &[RowInsert]) -> Result<(), StorageError> {
        (**self).write_batch(rows).await
    }
}

/// `true` for a plain SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Build a connection pool from database settings
///
/// A separately configured user or password overrides whatever the URL
/// carries.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, StorageError> {
    let mut options: PgConnectOptions = config.url.parse()?;
    if let Some(user) = &config.user {
        options = options.username(user);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_with(options)
        .await?;

    info!(
        max_connections = config.max_connections,
        "Connected to database"
    );
    Ok(pool)
}

/// Inserts batches into pre-existing PostgreSQL tables
///
/// Each batch runs in its own transaction. Consecutive rows for the same
/// relation are sent as one multi-row `INSERT ... VALUES`.
#[derive(Debug, Clone)]
pub struct PgBatchWriter {
    pool: PgPool,
    schema: Option<String>,
}

impl PgBatchWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, schema: None }
    }

    /// Qualify every table name with `schema`
    pub fn with_schema(mut self, schema: impl Into<String>) -> Result<Self, StorageError> {
        let schema = schema.into();
        if !is_identifier(&schema) {
            return Err(StorageError::Rejected(format!(
                "invalid schema name '{}'",
                schema
            )));
        }
        self.schema = Some(schema);
        Ok(self)
    }

    fn table(&self, relation: Relation) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, relation.table_name()),
            None => relation.table_name().to_string(),
        }
    }

    /// Insert statements for a batch, in batch order
    ///
    /// Each run of consecutive same-relation rows becomes one multi-row
    /// `INSERT`, split wherever a statement would exceed the bind limit.
    fn insert_statements<'a>(
        &self,
        rows: &'a [RowInsert],
    ) -> Result<Vec<QueryBuilder<'a, Postgres>>, StorageError> {
        let mut statements = Vec::new();

        for run in rows.chunk_by(|a, b| a.relation == b.relation) {
            let width = run.first().map_or(1, |row| row.columns.len().max(1));
            let per_statement = (MAX_BIND_PARAMS / width).max(1);

            for chunk in run.chunks(per_statement) {
                statements.push(self.insert_statement(chunk)?);
            }
        }

        Ok(statements)
    }

    /// `chunk` is non-empty and holds rows of a single relation
    fn insert_statement<'a>(
        &self,
        chunk: &'a [RowInsert],
    ) -> Result<QueryBuilder<'a, Postgres>, StorageError> {
        let Some(first) = chunk.first() else {
            return Err(StorageError::Rejected("empty insert".to_string()));
        };

        if let Some(row) = chunk
            .iter()
            .find(|row| !row.column_names().eq(first.column_names()))
        {
            return Err(StorageError::Rejected(format!(
                "row {} does not match the column layout of {}",
                row.key, first.relation
            )));
        }

        let mut query_builder: QueryBuilder<'a, Postgres> = QueryBuilder::new("INSERT INTO ");
        query_builder.push(self.table(first.relation));
        query_builder.push(" (");
        let mut columns = query_builder.separated(", ");
        for name in first.column_names() {
            columns.push(name);
        }
        columns.push_unseparated(") ");

        query_builder.push_values(chunk, |mut b, row| {
            for (_, value) in &row.columns {
                match value {
                    Value::BigInt(v) => b.push_bind(*v),
                    Value::Int(v) => b.push_bind(*v),
                    Value::Text(v) => b.push_bind(v.as_deref()),
                    Value::Bool(v) => b.push_bind(*v),
                };
            }
        });

        Ok(query_builder)
    }
}

#[async_trait]
impl BatchWriter for PgBatchWriter {
    async fn write_batch(&mut self, rows: &[RowInsert]) -> Result<(), StorageError> {
        // A malformed batch is rejected before a transaction is opened
        let statements = self.insert_statements(rows)?;

        let mut tx = self.pool.begin().await?;
        for mut statement in statements {
            statement.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(rows = rows.len(), "Batch inserted");
        Ok(())
    }
}

/// Accepts every batch without touching storage, counting rows per table
#[derive(Debug, Default)]
pub struct DryRunWriter {
    batches: u64,
    rows: BTreeMap<Relation, u64>,
}

impl DryRunWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Rows seen per relation, in relation order
    pub fn row_counts(&self) -> &BTreeMap<Relation, u64> {
        &self.rows
    }
}

#[async_trait]
impl BatchWriter for DryRunWriter {
    async fn write_batch(&mut self, rows: &[RowInsert]) -> Result<(), StorageError> {
        for row in rows {
            *self.rows.entry(row.relation).or_default() += 1;
        }
        self.batches += 1;
        debug!(batch = self.batches, rows = rows.len(), "Dry run: batch discarded");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dump::{Label, LabelRef};
    use crate::rows::Flatten;

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("discogs"));
        assert!(is_identifier("_staging_2024"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2024"));
        assert!(!is_identifier("public; drop table x"));
        assert!(!is_identifier("my-schema"));
    }

    #[tokio::test]
    async fn test_dry_run_counts_rows() {
        let label = Label {
            id: 1,
            sub_labels: vec![LabelRef::default(), LabelRef::default()],
            ..Default::default()
        };
        let rows = label.flatten();

        async fn write_through<W: BatchWriter>(mut writer: W, rows: &[RowInsert]) {
            writer.write_batch(rows).await.unwrap();
        }

        let mut writer = DryRunWriter::new();
        write_through(&mut writer, &rows).await;
        writer.write_batch(&rows[..1]).await.unwrap();

        assert_eq!(writer.batches(), 2);
        assert_eq!(writer.row_counts().get(&Relation::Labels), Some(&2));
        assert_eq!(writer.row_counts().get(&Relation::LabelSublabels), Some(&2));
        assert_eq!(writer.row_counts().get(&Relation::LabelUrls), None);
    }

    fn lazy_writer() -> PgBatchWriter {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/discogs")
            .unwrap();
        PgBatchWriter::new(pool)
    }

    fn label(id: i64, sub_labels: usize, urls: usize) -> Label {
        Label {
            id,
            name: Some(format!("Label {id}")),
            sub_labels: vec![LabelRef::default(); sub_labels],
            urls: (0..urls).map(|i| format!("https://example.com/{i}")).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_statements_follow_relation_runs() {
        let writer = lazy_writer().with_schema("discogs").unwrap();
        let mut rows = label(1, 2, 1).flatten();
        label(2, 0, 0).flatten_into(&mut rows);

        let statements = writer.insert_statements(&rows).unwrap();
        let sql: Vec<&str> = statements.iter().map(|s| s.sql()).collect();
        assert_eq!(
            sql,
            vec![
                "INSERT INTO discogs.labels (id, name, contact_info, profile, data_quality) \
                 VALUES ($1, $2, $3, $4, $5)",
                "INSERT INTO discogs.label_sublabels (label_id, ofst, label2_id, name) \
                 VALUES ($1, $2, $3, $4), ($5, $6, $7, $8)",
                "INSERT INTO discogs.label_urls (label_id, ofst, url) VALUES ($1, $2, $3)",
                "INSERT INTO discogs.labels (id, name, contact_info, profile, data_quality) \
                 VALUES ($1, $2, $3, $4, $5)",
            ]
        );
    }

    #[tokio::test]
    async fn test_insert_statements_split_at_bind_limit() {
        let writer = lazy_writer();
        // label_urls rows bind 3 parameters each
        let per_statement = MAX_BIND_PARAMS / 3;
        let rows = label(7, 0, per_statement + 1).flatten();

        let statements = writer.insert_statements(&rows).unwrap();
        assert_eq!(statements.len(), 3);
        assert!(statements[0].sql().starts_with("INSERT INTO labels "));
        assert!(statements[1].sql().starts_with("INSERT INTO label_urls "));
        assert!(statements[1].sql().ends_with(&format!("${})", per_statement * 3)));
        assert_eq!(
            statements[2].sql(),
            "INSERT INTO label_urls (label_id, ofst, url) VALUES ($1, $2, $3)"
        );
    }

    #[tokio::test]
    async fn test_mismatched_column_layout_is_rejected() {
        let writer = lazy_writer();
        let mut rows = label(3, 2, 0).flatten();
        rows[2].columns.pop();

        let err = writer.insert_statements(&rows).err().unwrap();
        assert!(
            matches!(err, StorageError::Rejected(ref msg) if msg.contains("label_sublabels[3, 1]")),
            "{err}"
        );
    }

    #[tokio::test]
    async fn test_empty_batch_has_no_statements() {
        assert!(lazy_writer().insert_statements(&[]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schema_must_be_identifier() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/discogs")
            .unwrap();

        let writer = PgBatchWriter::new(pool.clone()).with_schema("discogs").unwrap();
        assert_eq!(writer.table(Relation::TrackArtistMaps), "discogs.track_artist_maps");
        assert_eq!(PgBatchWriter::new(pool.clone()).table(Relation::Labels), "labels");
        assert!(matches!(
            PgBatchWriter::new(pool).with_schema("a.b"),
            Err(StorageError::Rejected(_))
        ));
    }
}
