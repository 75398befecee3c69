//! Runtime settings.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults,
//! 2. an optional settings file (`parklot.toml` unless `PARKLOT_CONFIG` names another),
//! 3. environment variables prefixed `PARKLOT__`, with `__` separating levels,
//!    e.g. `PARKLOT__DATABASE__PATH=/var/lib/parklot.db`.

use std::time::Duration;

use ::config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;
use crate::persist::{PersistenceMode, DEFAULT_BUSY_TIMEOUT_MS};

pub const DEFAULT_SETTINGS_FILE: &str = "parklot.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// File path of the database, or `:memory:`.
    pub path: String,
    pub busy_timeout_ms: u64,
}
impl DatabaseSettings {
    pub fn mode(&self) -> Result<PersistenceMode> {
        PersistenceMode::from_path(&self.path)
    }
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "parklot.db".to_string(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// An `EnvFilter` directive, used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Settings {
    /// Loads settings from the file named by `PARKLOT_CONFIG`, or the default
    /// file, and the environment. Missing files are not an error.
    pub fn load() -> Result<Self> {
        let file = std::env::var("PARKLOT_CONFIG").unwrap_or_else(|_| DEFAULT_SETTINGS_FILE.to_string());
        Self::load_from(&file)
    }

    pub fn load_from(file: &str) -> Result<Self> {
        Self::load_layers(file, environment())
    }

    fn load_layers(file: &str, environment: Environment) -> Result<Self> {
        let defaults = DatabaseSettings::default();
        let settings = Config::builder()
            .set_default("database.path", defaults.path)?
            .set_default("database.busy_timeout_ms", defaults.busy_timeout_ms)?
            .set_default("log.filter", "info")?
            .add_source(File::with_name(file).required(false))
            .add_source(environment)
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

fn environment() -> Environment {
    Environment::with_prefix("PARKLOT")
        .prefix_separator("__")
        .separator("__")
}
