//! Schema catalog: generic table and column operations over a backing store
//!
//! Table and column names are interpolated into statement text and must come
//! from trusted schema metadata. Values are always bound as parameters.

pub mod memory;
pub mod postgres;

pub use memory::MemoryCatalog;
pub use postgres::PostgresCatalog;

use crate::metrics::AggregateQuery;
use crate::schema::ColumnDefinition;
use crate::value::{Row, Value};
use crate::{ProfilerError, Result};
use async_trait::async_trait;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;
use tracing::warn;

/// Synthetic primary-key column added to every created table
pub const ID_COLUMN: &str = "id";

/// Forward-only, single-pass stream of rows
pub type RowStream = Pin<Box<dyn Stream<Item = Result<Row>> + Send>>;

/// Operations the profiler needs from a relational store
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Case-insensitive table existence check
    async fn table_exists(&self, name: &str) -> Result<bool>;

    /// Case-insensitive column existence check
    async fn column_exists(&self, table: &str, column: &str) -> Result<bool>;

    /// Columns of `table` in ordinal order. Empty when the table is absent.
    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnDefinition>>;

    /// Create `name` with an `id` identity column followed by `columns`
    async fn create_table(&self, name: &str, columns: &[ColumnDefinition]) -> Result<()>;

    /// Create `name` unless it is known to exist.
    ///
    /// A failed existence check is not treated as "exists": creation is
    /// attempted anyway and may race with a concurrent creator.
    async fn create_table_if_not_exists(
        &self,
        name: &str,
        columns: &[ColumnDefinition],
    ) -> Result<()> {
        match self.table_exists(name).await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => warn!("Could not confirm table {} exists, creating it: {}", name, e),
        }
        self.create_table(name, columns).await
    }

    async fn add_column(&self, table: &str, column: &ColumnDefinition) -> Result<()>;

    /// Insert one row and return its generated identifier
    async fn insert_row(&self, table: &str, values: &Row) -> Result<i64>;

    /// `SELECT <columns> FROM <table> [WHERE c1 = v1 AND ...]`
    async fn select_rows(&self, table: &str, columns: &[&str], filter: &Row) -> Result<RowStream>;

    async fn select_all(&self, table: &str, filter: &Row) -> Result<RowStream> {
        self.select_rows(table, &["*"], filter).await
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let mut rows = self
            .select_rows(table, &["count(*) AS count"], &Row::new())
            .await?;

        let row = rows
            .next()
            .await
            .ok_or_else(|| ProfilerError::Scan(format!("count on {} returned no rows", table)))??;

        row.get("count")
            .and_then(Value::as_i64)
            .ok_or_else(|| ProfilerError::Scan(format!("count on {} is not an integer", table)))
    }

    /// Run a single-pass aggregate query and read its one result row
    async fn fetch_aggregates(&self, query: &AggregateQuery) -> Result<Row>;
}
