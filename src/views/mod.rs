use anyhow::{Context, Result};
use std::{fmt, fs, path::Path};
use tracing::{error, info};

use crate::duck::Database;

pub mod split;

pub use split::{split_statements, SplitMode, Statement};

#[derive(Debug)]
pub struct StatementOutcome {
    pub index: usize,
    pub result: Result<(), String>,
}

/// What a script run did: per-statement results, then the views present in
/// the schema afterwards.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub statements: Vec<StatementOutcome>,
    pub views: Vec<String>,
}

impl InstallReport {
    pub fn executed(&self) -> usize {
        self.statements.iter().filter(|s| s.result.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &StatementOutcome> {
        self.statements.iter().filter(|s| s.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

impl fmt::Display for InstallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} views:", self.views.len())?;
        for v in &self.views {
            write!(f, "\n  - {}", v)?;
        }
        Ok(())
    }
}

/// Read `path` and run it through [`install_views`].
#[tracing::instrument(level = "info", skip(db, path), fields(script = %path.as_ref().display()))]
pub fn install_views_from_file<P: AsRef<Path>>(
    db: &Database,
    path: P,
    mode: SplitMode,
) -> Result<InstallReport> {
    let path = path.as_ref();
    let script =
        fs::read_to_string(path).with_context(|| format!("reading SQL script {:?}", path))?;
    install_views(db, &script, mode)
}

/// Execute every statement of `script`, continuing past failures, then list
/// the schema's views.
///
/// Each statement runs in DuckDB's autocommit mode, so one failure cannot undo
/// the statements around it. Only the final catalog query is fatal.
pub fn install_views(db: &Database, script: &str, mode: SplitMode) -> Result<InstallReport> {
    let statements = split_statements(script, mode);
    info!("{} statements to execute ({:?} split)", statements.len(), mode);

    let mut report = InstallReport::default();
    for stmt in statements {
        let result = match db.execute(&stmt.sql) {
            Ok(()) => {
                info!("statement {} executed successfully", stmt.index);
                Ok(())
            }
            Err(e) => {
                error!("error in statement {}: {:#}", stmt.index, e);
                Err(format!("{:#}", e))
            }
        };
        report.statements.push(StatementOutcome {
            index: stmt.index,
            result,
        });
    }

    report.views = db
        .list_views()
        .with_context(|| format!("listing views in schema {}", db.schema()))?;
    info!(
        "{} of {} statements succeeded, {} views in `{}`",
        report.executed(),
        report.statements.len(),
        report.views.len(),
        db.schema()
    );
    Ok(report)
}
