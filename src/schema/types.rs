// src/schema/types.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage type inferred for a destination column.
///
/// Variants are ordered by inference precedence: a column is the first type
/// every non-null value in it satisfies.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Integer,
    Float,
    DateTime,
    Text,
}

impl ColumnType {
    /// DuckDB type used in `CREATE TABLE`.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE",
            ColumnType::DateTime => "TIMESTAMP",
            ColumnType::Text => "VARCHAR",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "FLOAT",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Text => "TEXT",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single destination column: normalized name plus inferred type.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}
