use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use f1loader::{
    config::Config,
    import::{self, InsertMode, TableSource},
    views::{self, SplitMode},
    Database,
};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Load the F1 CSV dataset into DuckDB and install the analytics views"
)]
struct Cli {
    /// YAML config file (default: ./f1loader.yaml when present)
    #[arg(long, global = true, env = "F1LOADER_CONFIG")]
    config: Option<PathBuf>,
    /// DuckDB database file, or `:memory:`
    #[arg(long, global = true, env = "F1LOADER_DB")]
    db: Option<String>,
    /// Target schema
    #[arg(long, global = true, env = "F1LOADER_SCHEMA")]
    schema: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drop, recreate and fill one table per configured CSV file
    Import {
        /// Directory holding the CSV files
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long, value_enum)]
        mode: Option<InsertMode>,
        /// Only import these tables (repeatable)
        #[arg(long = "table")]
        tables: Vec<String>,
        /// Exit with an error if any table failed
        #[arg(long)]
        strict: bool,
    },
    /// Run a SQL script statement by statement, then list the views
    Views {
        /// SQL script to run
        script: Option<PathBuf>,
        #[arg(long, value_enum)]
        split: Option<SplitMode>,
        /// Exit with an error if any statement failed
        #[arg(long)]
        strict: bool,
    },
    /// Print the CREATE TABLE each CSV file would produce, without a database
    Inspect {
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long = "table")]
        tables: Vec<String>,
    },
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    // ─── 2) config: CLI > file > defaults ────────────────────────────
    let cli = Cli::parse();
    let mut cfg = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        cfg.database.path = db;
    }
    if let Some(schema) = cli.schema {
        cfg.database.schema = schema;
    }

    match cli.command {
        Command::Import {
            dir,
            mode,
            tables,
            strict,
        } => {
            if let Some(dir) = dir {
                cfg.import.dir = dir;
            }
            if let Some(mode) = mode {
                cfg.import.mode = mode;
            }
            let sources = select_tables(&cfg.import.tables, &tables)?;
            run_import(&cfg, &sources, strict)
        }
        Command::Views {
            script,
            split,
            strict,
        } => {
            if let Some(script) = script {
                cfg.views.script = script;
            }
            if let Some(split) = split {
                cfg.views.split = split;
            }
            run_views(&cfg, strict)
        }
        Command::Inspect { dir, tables } => {
            if let Some(dir) = dir {
                cfg.import.dir = dir;
            }
            let sources = select_tables(&cfg.import.tables, &tables)?;
            run_inspect(&cfg, &sources)
        }
    }
}

/// Keep the configured sources named in `wanted`; all of them when empty.
fn select_tables(configured: &[TableSource], wanted: &[String]) -> Result<Vec<TableSource>> {
    if wanted.is_empty() {
        return Ok(configured.to_vec());
    }
    for name in wanted {
        if !configured.iter().any(|s| &s.table == name) {
            bail!("table `{}` is not configured", name);
        }
    }
    Ok(configured
        .iter()
        .filter(|s| wanted.contains(&s.table))
        .cloned()
        .collect())
}

fn run_import(cfg: &Config, sources: &[TableSource], strict: bool) -> Result<()> {
    let opts = cfg.import_options();
    info!(
        dir = %opts.dir.display(),
        mode = ?opts.mode,
        "importing {} tables",
        sources.len()
    );

    let mut db = Database::open(&cfg.database.path, &cfg.database.schema)?;
    let report = import::import_all(&mut db, sources, &opts);
    if let Err(e) = db.close() {
        error!("{:#}", e);
    }

    for t in report.failed() {
        if let Err(e) = &t.result {
            println!("✗ {} ({}): {}", t.source.table, t.source.file, e);
        }
    }
    println!("{}", report);

    if strict && !report.is_success() {
        bail!("{} tables failed", report.tables.len() - report.succeeded());
    }
    Ok(())
}

fn run_views(cfg: &Config, strict: bool) -> Result<()> {
    let db = Database::open(&cfg.database.path, &cfg.database.schema)?;
    let result = views::install_views_from_file(&db, &cfg.views.script, cfg.views.split);
    if let Err(e) = db.close() {
        error!("{:#}", e);
    }
    let report = result?;

    println!("{}", report);
    if strict && !report.is_success() {
        bail!("{} statements failed", report.failed().count());
    }
    Ok(())
}

fn run_inspect(cfg: &Config, sources: &[TableSource]) -> Result<()> {
    let opts = cfg.import_options();
    for source in sources {
        match import::inspect_table(source, &opts, &cfg.database.schema) {
            Ok(ddl) => println!("{}\n", ddl),
            Err(e) => error!("failed to inspect `{}`: {:#}", source.file, e),
        }
    }
    Ok(())
}
