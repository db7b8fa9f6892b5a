// src/process/mod.rs
use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use std::{fs::File, io::Read, path::Path};
use tracing::{debug, warn};

pub mod convert;
pub mod date_parser;
pub mod raw_table;
pub mod utils;

pub use raw_table::RawTable;

/// Open `path` and read it as a headed CSV file.
///
/// - The first record supplies the column names, normalized via
///   [`utils::normalize_headers`].
/// - Rows shorter than the header are padded with empty (null) cells.
/// - A row longer than the header is an error for the whole file.
#[tracing::instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    let label = path.display().to_string();
    read_csv(file, &label)
}

/// Parse CSV data from any reader; `label` names the source in errors.
pub fn read_csv<R: Read>(reader: R, label: &str) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // short rows are padded below, long rows rejected
        .from_reader(reader);

    let raw_headers: Vec<String> = rdr
        .headers()
        .with_context(|| format!("Failed to read header row of {}", label))?
        .iter()
        .map(|s| s.to_string())
        .collect();
    if raw_headers.is_empty() || raw_headers.iter().all(|h| h.trim().is_empty()) {
        bail!("{} has no header row", label);
    }
    let headers = utils::normalize_headers(&raw_headers);
    let width = headers.len();

    let mut rows = Vec::new();
    let mut padded = 0usize;
    for (idx, result) in rdr.records().enumerate() {
        let record =
            result.with_context(|| format!("CSV parse error in {} at record {}", label, idx + 1))?;
        if record.len() > width {
            bail!(
                "{}: record {} has {} fields, header has {}",
                label,
                idx + 1,
                record.len(),
                width
            );
        }
        let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        if row.len() < width {
            padded += 1;
            row.resize(width, String::new());
        }
        rows.push(row);
    }

    if padded > 0 {
        warn!("{}: padded {} short rows with nulls", label, padded);
    }
    debug!("{}: {} columns, {} rows", label, width, rows.len());

    Ok(RawTable { headers, rows })
}
