use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tidemark_core::{AppError, AppResult};

/// Connection name used when `--database` is not given.
pub const DEFAULT_DATABASE: &str = "default";

/// Cleanup configuration file: named database connections plus the ordered
/// list of table retention policies.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanerConfig {
    /// Named database connection URLs.
    #[serde(default)]
    pub databases: BTreeMap<String, String>,
    /// Tables to clean, in order.
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

/// One table's binding and retention rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    /// Table name in the target database.
    pub name: String,
    /// Primary key column used for row-by-row deletion. Defaults to `id`.
    #[serde(default)]
    pub primary_key: Option<String>,
    /// Ordering column the table declares as its default.
    #[serde(default)]
    pub default_ordering: Option<String>,
    /// Policy-level ordering field override.
    #[serde(default)]
    pub ordering_field: Option<String>,
    /// Minimum number of most-recent rows to always retain.
    #[serde(default)]
    pub keep_records: u64,
    /// Retain rows newer than this many days.
    #[serde(default)]
    pub keep_since_days: u32,
    /// Retain rows newer than this many hours.
    #[serde(default)]
    pub keep_since_hours: u32,
}

impl CleanerConfig {
    /// Loads and parses the configuration file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path).map_err(|error| {
            AppError::Configuration(format!(
                "failed to read config file '{}': {error}",
                path.display()
            ))
        })?;

        toml::from_str(raw.as_str()).map_err(|error| {
            AppError::Configuration(format!(
                "invalid config file '{}': {error}",
                path.display()
            ))
        })
    }

    /// Resolves a named connection URL. The default connection falls back to
    /// the `DATABASE_URL` environment variable when not configured.
    pub fn database_url(&self, name: &str) -> AppResult<String> {
        if let Some(url) = self.databases.get(name) {
            return Ok(url.clone());
        }

        if name == DEFAULT_DATABASE
            && let Ok(url) = env::var("DATABASE_URL")
        {
            return Ok(url);
        }

        Err(AppError::Configuration(format!(
            "database connection '{name}' is not configured"
        )))
    }
}
