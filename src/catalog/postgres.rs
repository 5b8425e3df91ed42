//! PostgreSQL catalog over `tokio-postgres`

use super::{Catalog, RowStream, ID_COLUMN};
use crate::metrics::AggregateQuery;
use crate::schema::{ColumnDefinition, TypeTag};
use crate::value::{Row, Value};
use crate::{ProfilerError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, info};

/// Catalog backed by a single PostgreSQL connection.
///
/// The connection is established by [`PostgresCatalog::connect`] and reused
/// for every operation. It is not meant to be shared between concurrent
/// profiling runs.
pub struct PostgresCatalog {
    client: Client,
    driver: JoinHandle<()>,
}

impl PostgresCatalog {
    /// Connect using a complete connection string
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .map_err(|e| ProfilerError::Connection(e.to_string()))?;

        // Spawn connection handler
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        info!("Connected to PostgreSQL");
        Ok(Self { client, driver })
    }

    /// Close the connection and wait for the connection task to finish
    pub async fn close(self) -> Result<()> {
        let Self { client, driver } = self;
        drop(client);
        driver
            .await
            .map_err(|e| ProfilerError::Connection(format!("connection task failed: {}", e)))
    }

    pub async fn database_exists(&self, name: &str) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_database WHERE datname = $1)",
                &[&name],
            )
            .await?;
        scan_bool(&row)
    }

    async fn execute_ddl(&self, sql: &str) -> Result<()> {
        debug!("Executing DDL: {}", sql);
        self.client.batch_execute(sql).await.map_err(|e| {
            match ProfilerError::from(e) {
                ProfilerError::Query(msg) => ProfilerError::Schema(msg),
                other => other,
            }
        })
    }
}

#[async_trait]
impl Catalog for PostgresCatalog {
    async fn table_exists(&self, name: &str) -> Result<bool> {
        let (schema, table) = split_qualified(name);
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
                 WHERE lower(table_schema) = lower(COALESCE($1::text, current_schema())) \
                 AND lower(table_name) = lower($2))",
                &[&schema, &table],
            )
            .await?;
        scan_bool(&row)
    }

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let (schema, table) = split_qualified(table);
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM information_schema.columns \
                 WHERE lower(table_schema) = lower(COALESCE($1::text, current_schema())) \
                 AND lower(table_name) = lower($2) AND lower(column_name) = lower($3))",
                &[&schema, &table, &column],
            )
            .await?;
        scan_bool(&row)
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnDefinition>> {
        let (schema, table) = split_qualified(table);
        let rows = self
            .client
            .query(
                "SELECT column_name::text, udt_name::text FROM information_schema.columns \
                 WHERE lower(table_schema) = lower(COALESCE($1::text, current_schema())) \
                 AND lower(table_name) = lower($2) \
                 ORDER BY ordinal_position",
                &[&schema, &table],
            )
            .await?;

        rows.iter()
            .map(|row| {
                let name: String = row
                    .try_get(0)
                    .map_err(|e| ProfilerError::Scan(e.to_string()))?;
                let type_name: String = row
                    .try_get(1)
                    .map_err(|e| ProfilerError::Scan(e.to_string()))?;
                Ok(ColumnDefinition::new(name, TypeTag::from_pg_name(&type_name)))
            })
            .collect()
    }

    async fn create_table(&self, name: &str, columns: &[ColumnDefinition]) -> Result<()> {
        self.execute_ddl(&create_table_sql(name, columns)).await
    }

    async fn add_column(&self, table: &str, column: &ColumnDefinition) -> Result<()> {
        let sql = format!("ALTER TABLE {} ADD COLUMN {}", table, column.to_sql());
        self.execute_ddl(&sql).await
    }

    async fn insert_row(&self, table: &str, values: &Row) -> Result<i64> {
        let sql = insert_sql(table, values);
        let params: Vec<&(dyn ToSql + Sync)> = values.values().map(Value::as_param).collect();

        debug!("Inserting row: {}", sql);
        let row = self.client.query_one(sql.as_str(), &params).await?;

        Value::from_pg_row(&row, 0)?
            .as_i64()
            .ok_or_else(|| ProfilerError::Scan(format!("insert into {} returned no id", table)))
    }

    async fn select_rows(&self, table: &str, columns: &[&str], filter: &Row) -> Result<RowStream> {
        let sql = select_sql(table, columns, filter);
        let params: Vec<&(dyn ToSql + Sync)> = filter.values().map(Value::as_param).collect();

        debug!("Selecting rows: {}", sql);
        let stream = self.client.query_raw(sql.as_str(), params).await?;

        let rows = stream.map(|result| {
            result
                .map_err(ProfilerError::from)
                .and_then(|row| decode_row(&row))
        });
        Ok(Box::pin(rows))
    }

    async fn fetch_aggregates(&self, query: &AggregateQuery) -> Result<Row> {
        if query.is_empty() {
            return Ok(Row::new());
        }

        let sql = query.to_sql();
        debug!("Computing aggregates: {}", sql);
        let row = self.client.query_one(sql.as_str(), &[]).await?;
        decode_row(&row)
    }
}

/// Split `schema.table`. Unqualified names resolve against `current_schema()`.
fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((schema, table)) => (Some(schema), table),
        None => (None, name),
    }
}

fn scan_bool(row: &tokio_postgres::Row) -> Result<bool> {
    row.try_get(0)
        .map_err(|e| ProfilerError::Scan(e.to_string()))
}

fn decode_row(row: &tokio_postgres::Row) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| Ok((column.name().to_string(), Value::from_pg_row(row, i)?)))
        .collect()
}

fn create_table_sql(name: &str, columns: &[ColumnDefinition]) -> String {
    let mut items = vec![format!("{} BIGSERIAL PRIMARY KEY", ID_COLUMN)];
    items.extend(columns.iter().map(ColumnDefinition::to_sql));
    format!("CREATE TABLE {} ({})", name, items.join(", "))
}

/// Each value gets its own positional parameter, in map order
fn insert_sql(table: &str, values: &Row) -> String {
    if values.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, ID_COLUMN);
    }

    let columns: Vec<&str> = values.keys().map(String::as_str).collect();
    let placeholders: Vec<String> = values
        .values()
        .enumerate()
        .map(|(i, value)| format!("${}::{}", i + 1, value.pg_cast()))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        table,
        columns.join(", "),
        placeholders.join(", "),
        ID_COLUMN
    )
}

fn select_sql(table: &str, columns: &[&str], filter: &Row) -> String {
    let mut sql = format!("SELECT {} FROM {}", columns.join(", "), table);

    if !filter.is_empty() {
        let clauses: Vec<String> = filter
            .iter()
            .enumerate()
            .map(|(i, (column, value))| format!("{} = ${}::{}", column, i + 1, value.pg_cast()))
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    sql
}
