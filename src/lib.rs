//! table-profiler: per-column statistics for PostgreSQL tables
//!
//! For every requested table the [`Profiler`] discovers its columns, picks
//! the metrics that apply to each column type, makes sure a
//! `<table>_profile` table with matching columns exists, computes all
//! metrics in one aggregate query and appends the result as a new row.

pub mod catalog;
pub mod config;
pub mod errors;
pub mod logger;
pub mod metrics;
pub mod profiler;
pub mod schema;
pub mod value;

// Re-exports
pub use catalog::{Catalog, MemoryCatalog, PostgresCatalog, RowStream};
pub use config::ProfilerConfig;
pub use errors::{ProfilerError, Result};
pub use logger::init_logging;
pub use metrics::{plan_for, AggregateQuery, Metric, MetricColumn};
pub use profiler::{ProfileSummary, Profiler};
pub use schema::{ColumnDefinition, TypeTag};
pub use value::{row, Row, Value};
pub use rust_decimal::Decimal;

use tracing::info;

/// Connect with `config.database_url` and profile `tables` in order
pub async fn profile_database<I, S>(config: ProfilerConfig, tables: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let url = config
        .database_url
        .clone()
        .ok_or_else(|| ProfilerError::Configuration("database_url is not set".into()))?;

    let catalog = PostgresCatalog::connect(&url).await?;
    let result = Profiler::with_config(&catalog, config)
        .profile_tables(tables)
        .await;

    catalog.close().await?;
    info!("Connection closed");
    result
}
