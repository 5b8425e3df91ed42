//! Scalar values carried between the profiler and the store

use crate::{ProfilerError, Result};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tokio_postgres::types::{ToSql, Type};

/// A single row keyed by column name
pub type Row = BTreeMap<String, Value>;

const NULL_PARAM: Option<i64> = None;

/// Closed set of scalar kinds that can be bound or decoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Float(f64),
    /// Exact NUMERIC value
    Decimal(Decimal),
    Text(String),
    Boolean(bool),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Exact numeric view. Non-finite floats have none.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Integer(v) => Some(Decimal::from(*v)),
            Value::Float(v) => Decimal::from_f64(*v),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_) | Value::Decimal(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Explicit parameter cast so the server never has to guess the type.
    /// Postgres applies assignment casts from these to the target column.
    pub(crate) fn pg_cast(&self) -> &'static str {
        match self {
            Value::Integer(_) | Value::Null => "bigint",
            Value::Float(_) => "double precision",
            Value::Decimal(_) => "numeric",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
        }
    }

    pub(crate) fn as_param(&self) -> &(dyn ToSql + Sync) {
        match self {
            Value::Integer(v) => v,
            Value::Float(v) => v,
            Value::Decimal(d) => d,
            Value::Text(s) => s,
            Value::Boolean(b) => b,
            Value::Null => &NULL_PARAM,
        }
    }

    /// Decode column `idx` of a PostgreSQL row
    pub(crate) fn from_pg_row(row: &tokio_postgres::Row, idx: usize) -> Result<Value> {
        let column = &row.columns()[idx];

        let decoded = match *column.type_() {
            Type::INT2 => row
                .try_get::<_, Option<i16>>(idx)
                .map(|v| v.map(|v| Value::Integer(v.into()))),
            Type::INT4 => row
                .try_get::<_, Option<i32>>(idx)
                .map(|v| v.map(|v| Value::Integer(v.into()))),
            Type::INT8 => row
                .try_get::<_, Option<i64>>(idx)
                .map(|v| v.map(Value::Integer)),
            Type::FLOAT4 => row
                .try_get::<_, Option<f32>>(idx)
                .map(|v| v.map(|v| Value::Float(v.into()))),
            Type::FLOAT8 => row
                .try_get::<_, Option<f64>>(idx)
                .map(|v| v.map(Value::Float)),
            Type::NUMERIC => row
                .try_get::<_, Option<Decimal>>(idx)
                .map(|v| v.map(Value::Decimal)),
            Type::BOOL => row
                .try_get::<_, Option<bool>>(idx)
                .map(|v| v.map(Value::Boolean)),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => row
                .try_get::<_, Option<String>>(idx)
                .map(|v| v.map(Value::Text)),
            _ => {
                return Err(ProfilerError::Scan(format!(
                    "column {} has unsupported type {}",
                    column.name(),
                    column.type_()
                )))
            }
        };

        decoded
            .map(|v| v.unwrap_or(Value::Null))
            .map_err(|e| ProfilerError::Scan(format!("column {}: {}", column.name(), e)))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "NULL"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Build a [`Row`] from `(column, value)` pairs
pub fn row<K, V, I>(pairs: I) -> Row
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::Integer(40).as_f64(), Some(40.0));
        assert_eq!(Value::Float(35.5).as_i64(), None);
        assert_eq!(Value::from("Al").as_str(), Some("Al"));
        assert!(Value::from(None::<i64>).is_null());
    }

    #[test]
    fn test_decimal_view_is_exact() {
        let big = 9_007_199_254_740_993_i64;
        assert_eq!(Value::Integer(big).as_decimal(), Some(Decimal::from(big)));
        assert_eq!(Value::Float(1.5).as_decimal(), Decimal::from_f64(1.5));
        assert_eq!(Value::Float(f64::NAN).as_decimal(), None);
        assert_eq!(Value::Boolean(true).as_decimal(), None);
        assert!(Value::Decimal(Decimal::new(1234, 2)).is_numeric());
    }

    #[test]
    fn test_param_casts() {
        assert_eq!(Value::Integer(1).pg_cast(), "bigint");
        assert_eq!(Value::Float(1.0).pg_cast(), "double precision");
        assert_eq!(Value::Text("x".into()).pg_cast(), "text");
        assert_eq!(Value::Decimal(Decimal::ONE).pg_cast(), "numeric");
        assert_eq!(Value::Boolean(true).pg_cast(), "boolean");
        assert_eq!(Value::Null.pg_cast(), "bigint");
    }

    #[test]
    fn test_row_builder() {
        let r = row([("age", Value::Integer(30)), ("name", Value::from("Al"))]);
        assert_eq!(r.len(), 2);
        assert_eq!(r["age"], Value::Integer(30));
    }
}
