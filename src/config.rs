//! Layered settings: built-in defaults, then an optional `retail-ledger.toml`,
//! then `RETAIL_LEDGER_*` environment variables (`__` separates nested keys,
//! e.g. `RETAIL_LEDGER_DATABASE__PATH`).
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "retail-ledger";

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path
    pub path: String,
    pub max_connections: u32,
    /// How long a writer waits for the write lock before failing
    pub busy_timeout_ms: u64,
}

impl DatabaseSettings {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Connection URL; `create` lets SQLite create the file.
    pub fn url(&self, create: bool) -> String {
        if create {
            format!("sqlite:{}?mode=rwc", self.path)
        } else {
            format!("sqlite:{}", self.path)
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "retail-ledger.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `tracing` filter directive, e.g. `info` or `retail_ledger=debug`
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub log: LogSettings,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load with `file` (extension optional) as the optional file layer.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("database.path", "retail-ledger.db")?
            .set_default("database.max_connections", 5_i64)?
            .set_default("database.busy_timeout_ms", 5_000_i64)?
            .set_default("log.level", "info")?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("RETAIL_LEDGER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
