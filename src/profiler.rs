//! Profiling engine: discover, plan, materialize, compute, persist

use crate::catalog::Catalog;
use crate::config::ProfilerConfig;
use crate::metrics::{plan_columns, plan_for, AggregateQuery, MetricColumn};
use crate::schema::ColumnDefinition;
use crate::value::Row;
use crate::{ProfilerError, Result};
use serde::Serialize;
use tracing::{debug, info};

/// Outcome of profiling one source table
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub source_table: String,
    pub profile_table: String,
    /// Identifier of the row appended to the profile table
    pub row_id: i64,
    pub values: Row,
}

/// Computes per-column statistics and appends them to `<table>_profile`.
///
/// Holds no state between tables beyond the borrowed catalog.
pub struct Profiler<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    config: ProfilerConfig,
}

impl<'a, C: Catalog + ?Sized> Profiler<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self::with_config(catalog, ProfilerConfig::default())
    }

    pub fn with_config(catalog: &'a C, config: ProfilerConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    pub fn profile_table_name(&self, source_table: &str) -> String {
        format!("{}{}", source_table.to_lowercase(), self.config.profile_suffix)
    }

    /// Profile each table in order, stopping at the first failure
    pub async fn profile_tables<I, S>(&self, tables: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut profiled = 0usize;
        for table in tables {
            self.profile_table(table.as_ref()).await?;
            profiled += 1;
        }

        info!("Profiling complete: {} tables profiled", profiled);
        Ok(())
    }

    pub async fn profile_table(&self, table: &str) -> Result<ProfileSummary> {
        let metric_columns = self.plan_table(table).await?;
        let profile_table = self.profile_table_name(table);

        self.materialize(&profile_table, &metric_columns).await?;
        let values = self.compute(table, metric_columns).await?;
        let row_id = self.catalog.insert_row(&profile_table, &values).await?;

        info!(
            "Profiled {}: {} metrics written to {} (row {})",
            table,
            values.len(),
            profile_table,
            row_id
        );

        Ok(ProfileSummary {
            source_table: table.to_string(),
            profile_table,
            row_id,
            values,
        })
    }

    /// Metric columns for `table`, without touching the profile table
    pub async fn plan_table(&self, table: &str) -> Result<Vec<MetricColumn>> {
        if !self.catalog.table_exists(table).await? {
            return Err(ProfilerError::NotFound(format!(
                "table {} does not exist",
                table
            )));
        }

        let profiled: Vec<ColumnDefinition> = self
            .catalog
            .table_columns(table)
            .await?
            .into_iter()
            .filter(|column| !self.config.is_skipped(&column.name))
            .filter(|column| {
                let supported = !plan_for(&column.type_tag).is_empty();
                if !supported {
                    debug!(
                        "Skipping {}.{}: no metrics for type {}",
                        table, column.name, column.type_tag
                    );
                }
                supported
            })
            .collect();

        Ok(plan_columns(&profiled))
    }

    /// Create the profile table or add the metric columns it is missing.
    /// Existing columns are never dropped or altered.
    async fn materialize(&self, profile_table: &str, metric_columns: &[MetricColumn]) -> Result<()> {
        let definitions: Vec<ColumnDefinition> =
            metric_columns.iter().map(MetricColumn::definition).collect();

        self.catalog
            .create_table_if_not_exists(profile_table, &definitions)
            .await?;

        for definition in &definitions {
            if !self
                .catalog
                .column_exists(profile_table, &definition.name)
                .await?
            {
                debug!("Adding {} to {}", definition.name, profile_table);
                self.catalog.add_column(profile_table, definition).await?;
            }
        }
        Ok(())
    }

    async fn compute(&self, table: &str, metric_columns: Vec<MetricColumn>) -> Result<Row> {
        let query = AggregateQuery::new(table, metric_columns);
        if query.is_empty() {
            debug!("No profilable columns in {}", table);
            return Ok(Row::new());
        }
        self.catalog.fetch_aggregates(&query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::schema::TypeTag;

    #[tokio::test]
    async fn test_plan_skips_identity_and_unsupported_columns() {
        let catalog = MemoryCatalog::new();
        catalog
            .create_table(
                "events",
                &[
                    ColumnDefinition::new("score", TypeTag::Integer),
                    ColumnDefinition::new("payload", TypeTag::Unsupported("jsonb".into())),
                ],
            )
            .await
            .unwrap();

        let profiler = Profiler::new(&catalog);
        let names: Vec<String> = profiler
            .plan_table("events")
            .await
            .unwrap()
            .iter()
            .map(MetricColumn::column_name)
            .collect();

        assert_eq!(names, vec!["score_maximum", "score_minimum", "score_average"]);
    }

    #[tokio::test]
    async fn test_profile_table_name_uses_suffix() {
        let catalog = MemoryCatalog::new();
        let config = ProfilerConfig {
            profile_suffix: "_stats".into(),
            ..Default::default()
        };
        let profiler = Profiler::with_config(&catalog, config);
        assert_eq!(profiler.profile_table_name("Users"), "users_stats");
    }
}
