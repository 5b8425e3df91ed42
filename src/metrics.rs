//! Type-to-metric mapping and aggregate query construction

use crate::schema::{ColumnDefinition, TypeTag};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate statistics the profiler knows how to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Maximum,
    Minimum,
    Average,
    MaxLength,
    AvgLength,
}

const NUMERIC_PLAN: &[Metric] = &[Metric::Maximum, Metric::Minimum, Metric::Average];
const TEXT_PLAN: &[Metric] = &[Metric::MaxLength, Metric::AvgLength];
const EMPTY_PLAN: &[Metric] = &[];

impl Metric {
    /// Name used as the suffix of the metric column
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Maximum => "maximum",
            Metric::Minimum => "minimum",
            Metric::Average => "average",
            Metric::MaxLength => "max_length",
            Metric::AvgLength => "avg_length",
        }
    }

    /// Type of the profile column holding this metric.
    /// Value aggregates stay exact so BIGINT and NUMERIC sources keep every digit.
    pub fn result_type(&self) -> TypeTag {
        match self {
            Metric::Maximum | Metric::Minimum | Metric::Average => TypeTag::Numeric,
            Metric::MaxLength => TypeTag::BigInt,
            Metric::AvgLength => TypeTag::Double,
        }
    }

    /// Aggregate expression over `column`, cast to [`Metric::result_type`]
    pub fn expression(&self, column: &str) -> String {
        let aggregate = match self {
            Metric::Maximum => format!("max({})", column),
            Metric::Minimum => format!("min({})", column),
            Metric::Average => format!("avg({})", column),
            Metric::MaxLength => format!("max(length({}))", column),
            Metric::AvgLength => format!("avg(length({}))", column),
        };
        format!("CAST({} AS {})", aggregate, self.result_type().sql_name())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metrics that apply to a column of the given type. Unsupported types get none.
pub fn plan_for(type_tag: &TypeTag) -> &'static [Metric] {
    match type_tag {
        TypeTag::SmallInt
        | TypeTag::Integer
        | TypeTag::BigInt
        | TypeTag::Real
        | TypeTag::Double
        | TypeTag::Numeric => NUMERIC_PLAN,
        TypeTag::Text | TypeTag::Varchar | TypeTag::Char => TEXT_PLAN,
        TypeTag::Unsupported(_) => EMPTY_PLAN,
    }
}

/// One metric applied to one source column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricColumn {
    pub source_column: String,
    pub metric: Metric,
}

impl MetricColumn {
    pub fn new(source_column: impl Into<String>, metric: Metric) -> Self {
        Self {
            source_column: source_column.into(),
            metric,
        }
    }

    /// `<sourceColumn>_<metricName>`, lower-cased to match unquoted identifiers
    pub fn column_name(&self) -> String {
        format!("{}_{}", self.source_column, self.metric.name()).to_lowercase()
    }

    /// Column definition for the profile table
    pub fn definition(&self) -> ColumnDefinition {
        ColumnDefinition::new(self.column_name(), self.metric.result_type())
    }
}

/// Expand every source column into its metric columns
pub fn plan_columns(columns: &[ColumnDefinition]) -> Vec<MetricColumn> {
    columns
        .iter()
        .flat_map(|col| {
            plan_for(&col.type_tag)
                .iter()
                .map(move |metric| MetricColumn::new(col.name.clone(), *metric))
        })
        .collect()
}

/// Single-pass aggregate query over one source table
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateQuery {
    pub table: String,
    pub columns: Vec<MetricColumn>,
}

impl AggregateQuery {
    pub fn new(table: impl Into<String>, columns: Vec<MetricColumn>) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn to_sql(&self) -> String {
        let selects: Vec<String> = self
            .columns
            .iter()
            .map(|mc| format!("{} AS {}", mc.metric.expression(&mc.source_column), mc.column_name()))
            .collect();

        format!("SELECT {} FROM {}", selects.join(", "), self.table)
    }
}
