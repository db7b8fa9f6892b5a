// src/import/mod.rs
use anyhow::{Context, Result};
use duckdb::types::Value;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{error, info};

use crate::duck::{self, Database, Target};
use crate::process::{self, convert::convert_row, utils::NullValues};
use crate::schema::{self, Column};

/// Destination table name and the CSV file that feeds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSource {
    pub table: String,
    pub file: String,
}

impl TableSource {
    pub fn new(table: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            file: file.into(),
        }
    }
}

const F1_TABLES: &[&str] = &[
    "circuits",
    "constructor_results",
    "constructor_standings",
    "constructors",
    "driver_standings",
    "drivers",
    "lap_times",
    "pit_stops",
    "qualifying",
    "races",
    "results",
    "seasons",
    "sprint_results",
    "status",
];

/// The F1 dataset: each table reads `<table>.csv`.
pub fn default_sources() -> Vec<TableSource> {
    F1_TABLES
        .iter()
        .map(|t| TableSource::new(*t, format!("{}.csv", t)))
        .collect()
}

/// How rows reach the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InsertMode {
    /// Bulk load through the DuckDB appender.
    #[default]
    Appender,
    /// One parameterized `INSERT` per row.
    Row,
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub dir: PathBuf,
    pub mode: InsertMode,
    pub nulls: NullValues,
}

impl ImportOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mode: InsertMode::default(),
            nulls: NullValues::default(),
        }
    }

    fn path_of(&self, source: &TableSource) -> PathBuf {
        self.dir.join(&source.file)
    }
}

#[derive(Debug)]
pub struct TableOutcome {
    pub source: TableSource,
    /// Rows inserted, or the rendered error chain.
    pub result: Result<usize, String>,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub tables: Vec<TableOutcome>,
}

impl ImportReport {
    pub fn succeeded(&self) -> usize {
        self.tables.iter().filter(|t| t.result.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &TableOutcome> {
        self.tables.iter().filter(|t| t.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn total_rows(&self) -> usize {
        self.tables.iter().filter_map(|t| t.result.as_ref().ok()).sum()
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "imported {} of {} tables ({} rows)",
            self.succeeded(),
            self.tables.len(),
            self.total_rows()
        )
    }
}

/// Import every source in order. A failing table is logged and recorded in
/// the report; the loop always moves on to the next one.
pub fn import_all(db: &mut Database, sources: &[TableSource], opts: &ImportOptions) -> ImportReport {
    let mut report = ImportReport::default();
    for source in sources {
        info!("importing `{}` into `{}`", source.file, source.table);
        let start = Instant::now();
        let result = match import_table(db, source, opts) {
            Ok(n) => {
                info!(
                    table = %source.table,
                    elapsed = ?start.elapsed(),
                    "imported {} rows into `{}`",
                    n,
                    source.table
                );
                Ok(n)
            }
            Err(e) => {
                error!("failed to import `{}`: {:#}", source.file, e);
                Err(format!("{:#}", e))
            }
        };
        report.tables.push(TableOutcome {
            source: source.clone(),
            result,
        });
    }
    report
}

/// Load one CSV file into a freshly recreated table.
///
/// Drop, create and every insert share one transaction: any failure,
/// including a bad row, leaves the database as it was before the call.
#[tracing::instrument(level = "info", skip(db, source, opts), fields(table = %source.table))]
pub fn import_table(db: &mut Database, source: &TableSource, opts: &ImportOptions) -> Result<usize> {
    let path = opts.path_of(source);
    let raw = process::load_csv(&path)?;

    let columns = schema::derive_types(&source.table, &raw.headers, &raw.rows, &opts.nulls)?;
    let rows = raw
        .rows
        .iter()
        .map(|row| convert_row(row, &columns, &opts.nulls));
    replace_table(db, &source.table, &columns, rows, opts.mode)
}

/// Drop `table`, recreate it with `columns` and fill it from `rows`, all in one
/// transaction. The first failing row rolls back the drop as well.
pub fn replace_table<I>(
    db: &mut Database,
    table: &str,
    columns: &[Column],
    rows: I,
    mode: InsertMode,
) -> Result<usize>
where
    I: IntoIterator<Item = Result<Vec<Value>>>,
{
    let schema_name = db.schema().to_string();
    let target = Target {
        schema: &schema_name,
        table,
    };

    let tx = db.transaction()?;
    duck::drop_table(&tx, target)?;
    duck::create_table(&tx, target, columns)?;
    let inserted = match mode {
        InsertMode::Appender => duck::append_rows(&tx, target, rows)?,
        InsertMode::Row => duck::insert_rows(&tx, target, columns.len(), rows)?,
    };

    tx.commit()
        .with_context(|| format!("committing {}", target))?;
    Ok(inserted)
}

/// Infer the schema for `source` without touching any database.
pub fn infer_table(source: &TableSource, opts: &ImportOptions) -> Result<(Vec<Column>, usize)> {
    let raw = process::load_csv(opts.path_of(source))?;
    let columns = schema::derive_types(&source.table, &raw.headers, &raw.rows, &opts.nulls)?;
    Ok((columns, raw.len()))
}

/// `CREATE TABLE` statement the importer would issue for `source`.
pub fn inspect_table(source: &TableSource, opts: &ImportOptions, schema: &str) -> Result<String> {
    let (columns, rows) = infer_table(source, opts)?;
    let target = Target {
        schema,
        table: &source.table,
    };
    Ok(format!(
        "-- {} ({} rows)\n{}",
        Path::new(&source.file).display(),
        rows,
        duck::create_table_sql(target, &columns)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::TempDir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,f1loader=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    const STATUS: &str = "statusId,status\n1,Finished\n2,Disqualified\n3,Accident\n";
    const RACES: &str = "raceId,year,round,circuitId,name,date,time,url\n\
1,2009,1,1,Australian Grand Prix,2009-03-29,06:00:00,http://en.wikipedia.org/wiki/2009_Australian_Grand_Prix\n\
2,2009,2,2,Malaysian Grand Prix,2009-04-05,09:00:00,http://en.wikipedia.org/wiki/2009_Malaysian_Grand_Prix\n";
    const LAP_TIMES: &str = "raceId,driverId,lap,position,time,milliseconds\n\
841,20,1,1,1:38.109,98109\n\
841,20,2,1,1:33.006,93006\n\
841,17,1,3,1:40.573,100573\n";

    fn dataset() -> Result<(TempDir, Vec<TableSource>)> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("status.csv"), STATUS)?;
        fs::write(dir.path().join("races.csv"), RACES)?;
        fs::write(dir.path().join("lap_times.csv"), LAP_TIMES)?;
        let sources = vec![
            TableSource::new("status", "status.csv"),
            TableSource::new("races", "races.csv"),
            TableSource::new("lap_times", "lap_times.csv"),
        ];
        Ok((dir, sources))
    }

    fn column_types(db: &Database, table: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = db.connection().prepare(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE table_name = ? ORDER BY ordinal_position",
        )?;
        let cols = stmt
            .query_map(duckdb::params![table], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(cols)
    }

    #[test]
    fn default_sources_cover_the_f1_dataset() {
        let sources = default_sources();
        assert_eq!(sources.len(), 14);
        assert_eq!(sources[0], TableSource::new("circuits", "circuits.csv"));
        assert_eq!(sources[13], TableSource::new("status", "status.csv"));
    }

    #[test]
    fn row_counts_match_source_files() -> Result<()> {
        init_test_logging();
        let (dir, sources) = dataset()?;
        let mut db = Database::open_in_memory()?;

        let report = import_all(&mut db, &sources, &ImportOptions::new(dir.path()));
        assert!(report.is_success(), "{:?}", report);
        assert_eq!(report.total_rows(), 8);
        assert_eq!(db.row_count("status")?, 3);
        assert_eq!(db.row_count("races")?, 2);
        assert_eq!(db.row_count("lap_times")?, 3);
        Ok(())
    }

    #[test]
    fn inferred_types_reach_the_table() -> Result<()> {
        let (dir, _) = dataset()?;
        let mut db = Database::open_in_memory()?;
        import_table(
            &mut db,
            &TableSource::new("races", "races.csv"),
            &ImportOptions::new(dir.path()),
        )?;

        let types = column_types(&db, "races")?;
        let types: Vec<(&str, &str)> = types.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        assert_eq!(
            types,
            vec![
                ("raceId", "BIGINT"),
                ("year", "BIGINT"),
                ("round", "BIGINT"),
                ("circuitId", "BIGINT"),
                ("name", "VARCHAR"),
                ("date", "TIMESTAMP"),
                ("time", "VARCHAR"),
                ("url", "VARCHAR"),
            ]
        );
        Ok(())
    }

    #[test]
    fn rerun_yields_identical_tables() -> Result<()> {
        let (dir, sources) = dataset()?;
        let mut db = Database::open_in_memory()?;
        let opts = ImportOptions::new(dir.path());

        assert!(import_all(&mut db, &sources, &opts).is_success());
        db.execute("CREATE TABLE snapshot AS SELECT * FROM lap_times")?;
        // a stray write from another client is discarded by the rerun
        db.execute("INSERT INTO lap_times VALUES (1, 1, 1, 1, 'x', 1)")?;
        assert!(import_all(&mut db, &sources, &opts).is_success());

        assert_eq!(db.row_count("lap_times")?, 3);
        let diff: i64 = db.connection().query_row(
            "SELECT (SELECT COUNT(*) FROM (SELECT * FROM lap_times EXCEPT SELECT * FROM snapshot)) + \
                    (SELECT COUNT(*) FROM (SELECT * FROM snapshot EXCEPT SELECT * FROM lap_times))",
            [],
            |r| r.get(0),
        )?;
        assert_eq!(diff, 0);
        Ok(())
    }

    #[test]
    fn row_mode_matches_appender_mode() -> Result<()> {
        let (dir, sources) = dataset()?;
        let mut bulk = Database::open_in_memory()?;
        let mut single = Database::open_in_memory()?;

        let mut opts = ImportOptions::new(dir.path());
        let a = import_all(&mut bulk, &sources, &opts);
        opts.mode = InsertMode::Row;
        let b = import_all(&mut single, &sources, &opts);

        assert_eq!(a.total_rows(), b.total_rows());
        for s in &sources {
            assert_eq!(bulk.row_count(&s.table)?, single.row_count(&s.table)?);
        }
        Ok(())
    }

    #[test]
    fn failed_table_does_not_stop_the_run() -> Result<()> {
        init_test_logging();
        let (dir, mut sources) = dataset()?;
        sources.insert(1, TableSource::new("drivers", "drivers.csv")); // not on disk
        let mut db = Database::open_in_memory()?;

        let report = import_all(&mut db, &sources, &ImportOptions::new(dir.path()));
        assert_eq!(report.succeeded(), 3);
        let failed: Vec<&str> = report.failed().map(|t| t.source.table.as_str()).collect();
        assert_eq!(failed, vec!["drivers"]);
        assert_eq!(db.row_count("lap_times")?, 3);
        assert_eq!(report.to_string(), "imported 3 of 4 tables (8 rows)");
        Ok(())
    }

    #[test]
    fn failed_table_leaves_previous_object_in_place() -> Result<()> {
        let (dir, _) = dataset()?;
        let mut db = Database::open_in_memory()?;
        // a view occupying the table name makes DROP TABLE fail
        db.execute("CREATE VIEW status AS SELECT 42 AS answer")?;

        let source = TableSource::new("status", "status.csv");
        assert!(import_table(&mut db, &source, &ImportOptions::new(dir.path())).is_err());
        assert_eq!(db.list_views()?, vec!["status".to_string()]);
        Ok(())
    }

    #[test]
    fn failing_row_keeps_previous_table_contents() -> Result<()> {
        let (dir, _) = dataset()?;
        let mut db = Database::open_in_memory()?;
        let source = TableSource::new("status", "status.csv");
        assert_eq!(import_table(&mut db, &source, &ImportOptions::new(dir.path()))?, 3);

        let (columns, _) = infer_table(&source, &ImportOptions::new(dir.path()))?;
        for mode in [InsertMode::Appender, InsertMode::Row] {
            let rows = vec![
                Ok(vec![Value::BigInt(9), Value::Text("Retired".into())]),
                Err(anyhow::anyhow!("malformed row")),
                Ok(vec![Value::BigInt(10), Value::Text("Collision".into())]),
            ];
            let err = replace_table(&mut db, "status", &columns, rows, mode).unwrap_err();
            assert!(format!("{:#}", err).contains("malformed row"));

            assert_eq!(db.row_count("status")?, 3);
            let last: String = db.connection().query_row(
                "SELECT status FROM status ORDER BY statusId DESC LIMIT 1",
                [],
                |r| r.get(0),
            )?;
            assert_eq!(last, "Accident");
        }
        Ok(())
    }

    #[test]
    fn malformed_file_is_reported() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("seasons.csv"), "year,url\n2009,a,b\n")?;
        let mut db = Database::open_in_memory()?;

        let report = import_all(
            &mut db,
            &[TableSource::new("seasons", "seasons.csv")],
            &ImportOptions::new(dir.path()),
        );
        let err = report.tables[0].result.as_ref().unwrap_err();
        assert!(err.contains("has 3 fields"), "{err}");
        Ok(())
    }

    #[test]
    fn inspect_renders_ddl_without_a_database() -> Result<()> {
        let (dir, _) = dataset()?;
        let ddl = inspect_table(
            &TableSource::new("status", "status.csv"),
            &ImportOptions::new(dir.path()),
            "main",
        )?;
        assert_eq!(
            ddl,
            "-- status.csv (3 rows)\nCREATE TABLE \"main\".\"status\" (\"statusId\" BIGINT, \"status\" VARCHAR);"
        );
        Ok(())
    }
}
