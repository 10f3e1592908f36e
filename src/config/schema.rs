use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use sqlx::sqlite::SqliteJournalMode;

use crate::catalog::DEFAULT_MODIFY_RETRIES;

pub const ENV_PREFIX: &str = "TABULA";
pub const DEFAULT_SQLITE_DSN: &str = "sqlite://tabula.sqlite";

lazy_static! {
    static ref SCHEMA_NAME: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex is valid");
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct TabulaConfig {
    pub catalog: Catalog,
    #[serde(default)]
    pub misc: Misc,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Catalog {
    #[cfg(feature = "catalog-postgres")]
    Postgres(Postgres),
    Sqlite(Sqlite),
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Postgres {
    pub dsn: String,
    #[serde(default = "default_schema")]
    pub schema: String,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Sqlite {
    pub dsn: String,
    #[serde(default)]
    pub journal_mode: JournalMode,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
    Truncate,
    Persist,
    Memory,
    Off,
}

impl From<JournalMode> for SqliteJournalMode {
    fn from(mode: JournalMode) -> Self {
        match mode {
            JournalMode::Wal => SqliteJournalMode::Wal,
            JournalMode::Delete => SqliteJournalMode::Delete,
            JournalMode::Truncate => SqliteJournalMode::Truncate,
            JournalMode::Persist => SqliteJournalMode::Persist,
            JournalMode::Memory => SqliteJournalMode::Memory,
            JournalMode::Off => SqliteJournalMode::Off,
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Misc {
    /// How often a modify is retried when the cell keeps changing under it
    pub modify_retries: u32,
}

impl Default for Misc {
    fn default() -> Self {
        Self {
            modify_retries: DEFAULT_MODIFY_RETRIES,
        }
    }
}

pub fn validate_config(config: TabulaConfig) -> Result<TabulaConfig, ConfigError> {
    let dsn = match &config.catalog {
        #[cfg(feature = "catalog-postgres")]
        Catalog::Postgres(Postgres { dsn, schema }) => {
            if !SCHEMA_NAME.is_match(schema) {
                return Err(ConfigError::Message(format!(
                    "Postgres schema {schema:?} must be a plain identifier"
                )));
            }
            dsn
        }
        Catalog::Sqlite(Sqlite { dsn, .. }) => dsn,
    };

    if dsn.trim().is_empty() {
        return Err(ConfigError::Message(
            "The catalog DSN can't be empty".to_string(),
        ));
    }

    if config.misc.modify_retries == 0 {
        return Err(ConfigError::Message(
            "misc.modify_retries must be at least 1".to_string(),
        ));
    }

    Ok(config)
}

// Defaults go in first so that any file, string or environment source
// overrides them
fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("catalog.type", "sqlite")?
        .set_default("catalog.dsn", DEFAULT_SQLITE_DSN)
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Loads the configuration from built-in defaults, then the TOML file at
/// `path` if there is one, then `TABULA__*` environment variables.
pub fn load_config(path: Option<&Path>) -> Result<TabulaConfig, ConfigError> {
    let mut config = builder()?;

    if let Some(path) = path {
        config = config.add_source(File::from(path).format(FileFormat::Toml).required(true));
    }

    config
        .add_source(environment())
        .build()?
        .try_deserialize()
        .and_then(validate_config)
}

// Load a config from a string (to test our structs are defined correctly)
pub fn load_config_from_string(
    config_str: &str,
    skip_validation: bool,
) -> Result<TabulaConfig, ConfigError> {
    let config = builder()?
        .add_source(File::from_str(config_str, FileFormat::Toml));

    if skip_validation {
        config.build()?.try_deserialize()
    } else {
        config.build()?.try_deserialize().and_then(validate_config)
    }
}
