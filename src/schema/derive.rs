use anyhow::anyhow;
use anyhow::Result;
use tracing::{debug, warn};

use super::{Column, ColumnType};
use crate::process::{date_parser, utils::NullValues};

/// Infer one `Column` per header from the full set of rows.
///
///  - Null cells are ignored
///  - A column takes the first of INTEGER, FLOAT, DATETIME every remaining
///    value parses as, otherwise TEXT
///  - A column with no non-null values is TEXT
///
/// Headers are expected to be normalized already.
pub fn derive_types(
    table_name: &str,
    header_names: &[String],
    rows: &[Vec<String>],
    nulls: &NullValues,
) -> Result<Vec<Column>> {
    if header_names.is_empty() {
        return Err(anyhow!("derive_types: `{}` has no headers", table_name));
    }

    let mut cols = Vec::with_capacity(header_names.len());
    for (idx, name) in header_names.iter().enumerate() {
        let cells = rows
            .iter()
            .filter_map(|row| row.get(idx).map(String::as_str))
            .filter(|cell| !nulls.is_null(cell));

        let ty = infer_column_type(cells);
        debug!("derive_types: `{}`.`{}` -> {}", table_name, name, ty);
        cols.push(Column {
            name: name.clone(),
            ty,
        });
    }

    if cols.iter().all(|c| c.ty == ColumnType::Text) && !rows.is_empty() {
        warn!("derive_types: every column of `{}` is TEXT", table_name);
    }

    Ok(cols)
}

/// Pick the storage type for a column given its non-null values.
pub fn infer_column_type<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = false;
    let mut all_int = true;
    let mut all_float = true;
    let mut all_datetime = true;

    for raw in values {
        seen = true;
        let v = raw.trim();
        if all_int && v.parse::<i64>().is_err() {
            all_int = false;
        }
        if all_float && !all_int && v.parse::<f64>().is_err() {
            all_float = false;
        }
        if all_datetime && date_parser::parse_datetime(v).is_none() {
            all_datetime = false;
        }
        if !all_int && !all_float && !all_datetime {
            return ColumnType::Text;
        }
    }

    match (seen, all_int, all_float, all_datetime) {
        (false, ..) => ColumnType::Text,
        (true, true, _, _) => ColumnType::Integer,
        (true, false, true, _) => ColumnType::Float,
        (true, false, false, true) => ColumnType::DateTime,
        _ => ColumnType::Text,
    }
}
