//! Column type tags and abstract column definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Column types the profiler understands
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Numeric,
    Text,
    Varchar,
    Char,
    /// Any other engine type, kept by its raw name
    Unsupported(String),
}

impl TypeTag {
    /// Parse a PostgreSQL type name (`udt_name` or SQL spelling)
    pub fn from_pg_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "int2" | "smallint" => TypeTag::SmallInt,
            "int4" | "int" | "integer" => TypeTag::Integer,
            "int8" | "bigint" => TypeTag::BigInt,
            "float4" | "real" => TypeTag::Real,
            "float8" | "double precision" => TypeTag::Double,
            "numeric" | "decimal" => TypeTag::Numeric,
            "text" => TypeTag::Text,
            "varchar" | "character varying" => TypeTag::Varchar,
            "bpchar" | "char" | "character" => TypeTag::Char,
            _ => TypeTag::Unsupported(name.to_string()),
        }
    }

    /// DDL spelling used in CREATE TABLE / ALTER TABLE
    pub fn sql_name(&self) -> &str {
        match self {
            TypeTag::SmallInt => "SMALLINT",
            TypeTag::Integer => "INTEGER",
            TypeTag::BigInt => "BIGINT",
            TypeTag::Real => "REAL",
            TypeTag::Double => "DOUBLE PRECISION",
            TypeTag::Numeric => "NUMERIC",
            TypeTag::Text => "TEXT",
            TypeTag::Varchar => "VARCHAR",
            TypeTag::Char => "CHAR",
            TypeTag::Unsupported(raw) => raw,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeTag::SmallInt
                | TypeTag::Integer
                | TypeTag::BigInt
                | TypeTag::Real
                | TypeTag::Double
                | TypeTag::Numeric
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self, TypeTag::Text | TypeTag::Varchar | TypeTag::Char)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// An abstract column to be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub type_tag: TypeTag,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
        }
    }

    /// `<name> <type>` as it appears in DDL
    pub fn to_sql(&self) -> String {
        format!("{} {}", self.name, self.type_tag.sql_name())
    }
}
