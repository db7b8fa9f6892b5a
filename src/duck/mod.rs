use anyhow::{anyhow, Context, Result};
use duckdb::{
    appender_params_from_iter, params, params_from_iter, types::Value, Connection, Transaction,
};
use std::fmt;
use tracing::{debug, info};

use crate::schema::Column;

pub const DEFAULT_SCHEMA: &str = "main";

/// The single DuckDB connection held for one run.
///
/// Dropping it releases the connection; [`Database::close`] does the same but
/// reports close errors.
pub struct Database {
    conn: Connection,
    schema: String,
}

impl Database {
    /// Open a DuckDB database on disk at `path` (`:memory:` for an in-memory
    /// one), creating the file if needed, and make `schema` the default schema.
    pub fn open(path: &str, schema: &str) -> Result<Self> {
        let opened = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        };
        let conn = opened.with_context(|| format!("opening DuckDB database {}", path))?;
        info!(path, schema, "connected");
        Self::with_schema(conn, schema)
    }

    /// Open a DuckDB in‐memory database using the default schema.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory DuckDB")?;
        Self::with_schema(conn, DEFAULT_SCHEMA)
    }

    fn with_schema(conn: Connection, schema: &str) -> Result<Self> {
        if schema.trim().is_empty() {
            return Err(anyhow!("schema name must not be empty"));
        }
        if schema != DEFAULT_SCHEMA {
            conn.execute_batch(&format!(
                "CREATE SCHEMA IF NOT EXISTS {}; SET schema = '{}';",
                quote_ident(schema),
                schema.replace('\'', "''")
            ))
            .with_context(|| format!("selecting schema {}", schema))?;
        }
        Ok(Self {
            conn,
            schema: schema.to_string(),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Qualified handle for `table` in this database's schema.
    pub fn target<'a>(&'a self, table: &'a str) -> Target<'a> {
        Target {
            schema: &self.schema,
            table,
        }
    }

    /// Run one SQL statement (or any script DuckDB accepts as a batch).
    pub fn execute(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Start a transaction; it rolls back unless committed.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        self.conn.transaction().context("starting transaction")
    }

    /// Names of all views in this database's schema, sorted.
    pub fn list_views(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = ? AND table_type = 'VIEW' \
             ORDER BY table_name",
        )?;
        let names = stmt
            .query_map(params![self.schema.as_str()], |r| r.get::<_, String>(0))?
            .collect::<duckdb::Result<Vec<_>>>()
            .context("querying view catalog")?;
        Ok(names)
    }

    pub fn row_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.target(table));
        self.conn
            .query_row(&sql, [], |r| r.get(0))
            .with_context(|| format!("counting rows of {}", table))
    }

    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| anyhow!("closing DuckDB connection: {}", e))?;
        info!("connection closed");
        Ok(())
    }
}

/// A schema-qualified table name; displays as a quoted SQL identifier.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub schema: &'a str,
    pub table: &'a str,
}

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", quote_ident(self.schema), quote_ident(self.table))
    }
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn drop_table(conn: &Connection, target: Target<'_>) -> Result<()> {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", target))
        .with_context(|| format!("dropping {}", target))
}

pub fn create_table_sql(target: Target<'_>, columns: &[Column]) -> String {
    let defs = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.ty.sql_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({});", target, defs)
}

pub fn create_table(conn: &Connection, target: Target<'_>, columns: &[Column]) -> Result<()> {
    let sql = create_table_sql(target, columns);
    debug!(%sql, "create table");
    conn.execute_batch(&sql)
        .with_context(|| format!("creating {}", target))
}

/// Insert rows in bulk through the DuckDB appender. Stops at the first bad
/// row; returns the number of rows appended.
pub fn append_rows<I>(conn: &Connection, target: Target<'_>, rows: I) -> Result<usize>
where
    I: IntoIterator<Item = Result<Vec<Value>>>,
{
    let mut appender = conn
        .appender_to_db(target.table, target.schema)
        .with_context(|| format!("opening appender on {}", target))?;

    let mut n = 0usize;
    for row in rows {
        let row = row.with_context(|| format!("row {} of {}", n + 1, target))?;
        appender
            .append_row(appender_params_from_iter(row))
            .with_context(|| format!("appending row {} to {}", n + 1, target))?;
        n += 1;
    }
    appender
        .flush()
        .with_context(|| format!("flushing appender on {}", target))?;
    Ok(n)
}

/// Insert rows one parameterized `INSERT` at a time.
pub fn insert_rows<I>(conn: &Connection, target: Target<'_>, width: usize, rows: I) -> Result<usize>
where
    I: IntoIterator<Item = Result<Vec<Value>>>,
{
    let placeholders = vec!["?"; width].join(", ");
    let sql = format!("INSERT INTO {} VALUES ({});", target, placeholders);
    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("preparing insert into {}", target))?;

    let mut n = 0usize;
    for row in rows {
        let row = row.with_context(|| format!("row {} of {}", n + 1, target))?;
        stmt.execute(params_from_iter(row))
            .with_context(|| format!("inserting row {} into {}", n + 1, target))?;
        n += 1;
    }
    Ok(n)
}
