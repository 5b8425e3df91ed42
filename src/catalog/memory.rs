//! In-process catalog for tests and dry runs

use super::{Catalog, RowStream, ID_COLUMN};
use crate::metrics::{AggregateQuery, Metric};
use crate::schema::{ColumnDefinition, TypeTag};
use crate::value::{Row, Value};
use crate::{ProfilerError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Raw type names accepted besides the tagged ones
const KNOWN_RAW_TYPES: &[&str] = &[
    "bool",
    "boolean",
    "date",
    "timestamp",
    "timestamptz",
    "json",
    "jsonb",
    "uuid",
    "bytea",
];

#[derive(Debug)]
struct MemoryTable {
    columns: Vec<ColumnDefinition>,
    rows: Vec<Row>,
    next_id: i64,
}

impl MemoryTable {
    fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }

    fn require_column(&self, table: &str, column: &str) -> Result<&ColumnDefinition> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .ok_or_else(|| {
                ProfilerError::NotFound(format!(
                    "column {} of relation {} does not exist",
                    column, table
                ))
            })
    }

    fn values_of<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().filter_map(move |row| row.get(column))
    }
}

/// Catalog that keeps tables in memory.
///
/// Names are case-insensitive, like unquoted PostgreSQL identifiers, and
/// every table gets an `id` identity column. Inserted values must suit the
/// column type the way PostgreSQL requires.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tables: Mutex<HashMap<String, MemoryTable>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all tables, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}

/// There is a single namespace, so a schema qualifier is dropped
fn table_key(name: &str) -> String {
    let folded = fold(name);
    match folded.rsplit_once('.') {
        Some((_, table)) => table.to_string(),
        None => folded,
    }
}

fn is_boolean_type(raw: &str) -> bool {
    matches!(fold(raw).as_str(), "bool" | "boolean")
}

/// Reject values PostgreSQL would refuse to store in a column of this type
fn check_assignable(table: &str, column: &ColumnDefinition, value: &Value) -> Result<()> {
    let assignable = match (&column.type_tag, value) {
        (_, Value::Null) => true,
        (tag, value) if tag.is_numeric() => value.is_numeric(),
        (tag, value) if tag.is_text() => matches!(value, Value::Text(_)),
        (TypeTag::Unsupported(raw), value) if is_boolean_type(raw) => {
            matches!(value, Value::Boolean(_))
        }
        _ => true,
    };

    if assignable {
        Ok(())
    } else {
        Err(ProfilerError::Query(format!(
            "column \"{}\" of relation \"{}\" is of type {} but expression is of type {}",
            column.name,
            table,
            column.type_tag,
            value.pg_cast()
        )))
    }
}

fn validate_type(type_tag: &TypeTag) -> Result<()> {
    match type_tag {
        TypeTag::Unsupported(raw) if !KNOWN_RAW_TYPES.contains(&fold(raw).as_str()) => Err(
            ProfilerError::Schema(format!("type \"{}\" does not exist", raw)),
        ),
        _ => Ok(()),
    }
}

fn missing_table(name: &str) -> ProfilerError {
    ProfilerError::NotFound(format!("relation \"{}\" does not exist", name))
}

/// SQL equality: NULL never matches, numbers compare by exact value
fn sql_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (a, b) => match (a.as_decimal(), b.as_decimal()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// Recognizes `count(*)` with an optional `AS alias`
fn count_alias(projection: &str) -> Option<String> {
    let lowered = fold(projection);
    let rest = lowered.strip_prefix("count(*)")?.trim();
    if rest.is_empty() {
        return Some("count".to_string());
    }
    rest.strip_prefix("as ")
        .map(|alias| alias.trim().to_string())
}

fn mean(values: &[f64]) -> Value {
    if values.is_empty() {
        Value::Null
    } else {
        Value::Float(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn exact_mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    values
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))?
        .checked_div(Decimal::from(values.len()))
}

fn evaluate(metric: Metric, table: &MemoryTable, column: &str) -> Value {
    let numbers: Vec<Decimal> = table
        .values_of(column)
        .filter_map(Value::as_decimal)
        .collect();
    let lengths: Vec<i64> = table
        .values_of(column)
        .filter_map(Value::as_str)
        .map(|s| s.chars().count() as i64)
        .collect();

    match metric {
        Metric::Maximum => numbers.iter().copied().max().into(),
        Metric::Minimum => numbers.iter().copied().min().into(),
        Metric::Average => exact_mean(&numbers).into(),
        Metric::MaxLength => lengths.iter().copied().max().into(),
        Metric::AvgLength => mean(&lengths.iter().map(|l| *l as f64).collect::<Vec<_>>()),
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.tables.lock().contains_key(&table_key(name)))
    }

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let tables = self.tables.lock();
        Ok(tables
            .get(&table_key(table))
            .map(|t| t.has_column(&fold(column)))
            .unwrap_or(false))
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnDefinition>> {
        let tables = self.tables.lock();
        Ok(tables
            .get(&table_key(table))
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn create_table(&self, name: &str, columns: &[ColumnDefinition]) -> Result<()> {
        let key = table_key(name);
        let mut tables = self.tables.lock();
        if tables.contains_key(&key) {
            return Err(ProfilerError::Schema(format!(
                "relation \"{}\" already exists",
                key
            )));
        }

        let mut definitions = vec![ColumnDefinition::new(ID_COLUMN, TypeTag::BigInt)];
        for column in columns {
            validate_type(&column.type_tag)?;
            let folded = fold(&column.name);
            if definitions.iter().any(|c| c.name == folded) {
                return Err(ProfilerError::Schema(format!(
                    "column \"{}\" specified more than once",
                    folded
                )));
            }
            definitions.push(ColumnDefinition::new(folded, column.type_tag.clone()));
        }

        tables.insert(
            key,
            MemoryTable {
                columns: definitions,
                rows: Vec::new(),
                next_id: 1,
            },
        );
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &ColumnDefinition) -> Result<()> {
        let mut tables = self.tables.lock();
        let entry = tables
            .get_mut(&table_key(table))
            .ok_or_else(|| missing_table(table))?;

        let folded = fold(&column.name);
        if entry.has_column(&folded) {
            return Err(ProfilerError::Schema(format!(
                "column \"{}\" of relation \"{}\" already exists",
                folded, table
            )));
        }
        validate_type(&column.type_tag)?;

        for row in entry.rows.iter_mut() {
            row.insert(folded.clone(), Value::Null);
        }
        entry
            .columns
            .push(ColumnDefinition::new(folded, column.type_tag.clone()));
        Ok(())
    }

    async fn insert_row(&self, table: &str, values: &Row) -> Result<i64> {
        let mut tables = self.tables.lock();
        let entry = tables
            .get_mut(&table_key(table))
            .ok_or_else(|| missing_table(table))?;

        let mut stored = Row::new();
        for (column, value) in values {
            let folded = fold(column);
            let definition = entry.require_column(table, &folded)?;
            check_assignable(table, definition, value)?;
            stored.insert(folded, value.clone());
        }

        let id = entry.next_id;
        entry.next_id += 1;
        for column in &entry.columns {
            stored.entry(column.name.clone()).or_insert(Value::Null);
        }
        stored.insert(ID_COLUMN.to_string(), Value::Integer(id));
        entry.rows.push(stored);

        Ok(id)
    }

    async fn select_rows(&self, table: &str, columns: &[&str], filter: &Row) -> Result<RowStream> {
        let tables = self.tables.lock();
        let entry = tables.get(&table_key(table)).ok_or_else(|| missing_table(table))?;

        let mut conditions = Vec::with_capacity(filter.len());
        for (column, value) in filter {
            let folded = fold(column);
            entry.require_column(table, &folded)?;
            conditions.push((folded, value));
        }

        let matching: Vec<&Row> = entry
            .rows
            .iter()
            .filter(|row| {
                conditions
                    .iter()
                    .all(|(column, value)| row.get(column).map_or(false, |v| sql_eq(v, value)))
            })
            .collect();

        if let [projection] = columns {
            if let Some(alias) = count_alias(projection) {
                let count = Row::from([(alias, Value::Integer(matching.len() as i64))]);
                return Ok(Box::pin(futures::stream::iter(vec![Ok(count)])));
            }
        }

        let mut projected: Vec<String> = Vec::new();
        for projection in columns {
            if projection.trim() == "*" {
                projected.extend(entry.columns.iter().map(|c| c.name.clone()));
            } else {
                let folded = fold(projection);
                entry.require_column(table, &folded)?;
                projected.push(folded);
            }
        }

        let rows: Vec<Result<Row>> = matching
            .into_iter()
            .map(|row| {
                Ok(projected
                    .iter()
                    .map(|column| {
                        let value = row.get(column).cloned().unwrap_or(Value::Null);
                        (column.clone(), value)
                    })
                    .collect())
            })
            .collect();

        Ok(Box::pin(futures::stream::iter(rows)))
    }

    async fn fetch_aggregates(&self, query: &AggregateQuery) -> Result<Row> {
        let tables = self.tables.lock();
        let entry = tables
            .get(&table_key(&query.table))
            .ok_or_else(|| missing_table(&query.table))?;

        let mut result = Row::new();
        for metric_column in &query.columns {
            let source = fold(&metric_column.source_column);
            entry.require_column(&query.table, &source)?;
            result.insert(
                metric_column.column_name(),
                evaluate(metric_column.metric, entry, &source),
            );
        }
        Ok(result)
    }
}
