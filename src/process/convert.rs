use anyhow::{anyhow, bail, Result};
use duckdb::types::{TimeUnit, Value};

use crate::process::{date_parser, utils::NullValues};
use crate::schema::{Column, ColumnType};

/// Convert one raw cell into the DuckDB value for its column type.
pub fn convert_cell(cell: &str, ty: ColumnType, nulls: &NullValues) -> Result<Value> {
    if nulls.is_null(cell) {
        return Ok(Value::Null);
    }
    let v = cell.trim();
    let value = match ty {
        ColumnType::Integer => Value::BigInt(
            v.parse()
                .map_err(|e| anyhow!("cannot read {:?} as {}: {}", cell, ty, e))?,
        ),
        ColumnType::Float => Value::Double(
            v.parse()
                .map_err(|e| anyhow!("cannot read {:?} as {}: {}", cell, ty, e))?,
        ),
        ColumnType::DateTime => {
            let dt = date_parser::parse_datetime(v)
                .ok_or_else(|| anyhow!("cannot read {:?} as {}", cell, ty))?;
            Value::Timestamp(TimeUnit::Microsecond, dt.and_utc().timestamp_micros())
        }
        ColumnType::Text => Value::Text(cell.to_string()),
    };
    Ok(value)
}

/// Convert a raw row into values aligned with `columns`.
pub fn convert_row(row: &[String], columns: &[Column], nulls: &NullValues) -> Result<Vec<Value>> {
    if row.len() > columns.len() {
        bail!(
            "row has {} fields, table has {} columns",
            row.len(),
            columns.len()
        );
    }
    columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let cell = row.get(i).map(String::as_str).unwrap_or("");
            convert_cell(cell, col.ty, nulls).map_err(|e| e.context(format!("column `{}`", col.name)))
        })
        .collect()
}
