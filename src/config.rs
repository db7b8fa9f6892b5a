// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::duck::DEFAULT_SCHEMA;
use crate::import::{default_sources, ImportOptions, InsertMode, TableSource};
use crate::process::utils::{NullValues, DEFAULT_NULL_VALUES};
use crate::views::SplitMode;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "f1loader.yaml";

/// Settings for both jobs. Every field has a default, so a config file only
/// needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseConfig,
    pub import: ImportConfig,
    pub views: ViewsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// DuckDB file, or `:memory:`.
    pub path: String,
    pub schema: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "f1_analytics.duckdb".into(),
            schema: DEFAULT_SCHEMA.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    pub dir: PathBuf,
    pub tables: Vec<TableSource>,
    pub mode: InsertMode,
    /// Cell values read as NULL, in addition to the empty cell.
    pub null_values: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("datasets"),
            tables: default_sources(),
            mode: InsertMode::default(),
            null_values: DEFAULT_NULL_VALUES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewsConfig {
    pub script: PathBuf,
    pub split: SplitMode,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            script: PathBuf::from("f1_views.sql"),
            split: SplitMode::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing config YAML")
    }

    /// Load `path` if given (it must exist); otherwise load
    /// [`DEFAULT_CONFIG_PATH`] when present, else use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let p = PathBuf::from(DEFAULT_CONFIG_PATH);
                if !p.exists() {
                    debug!("no {} found, using defaults", DEFAULT_CONFIG_PATH);
                    return Ok(Self::default());
                }
                p
            }
        };
        let text =
            fs::read_to_string(&path).with_context(|| format!("reading config {:?}", path))?;
        let cfg = Self::from_yaml(&text).with_context(|| format!("in {:?}", path))?;
        info!(config = %path.display(), "loaded config");
        Ok(cfg)
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            dir: self.import.dir.clone(),
            mode: self.import.mode,
            nulls: NullValues::new(self.import.null_values.iter().cloned()),
        }
    }
}
