use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::query::DEFAULT_PAGE_SIZE;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("page_size must be at least 1")]
    ZeroPageSize,
}

/// Runtime settings
///
/// Sources, later ones winning: built-in defaults, an optional
/// `statements.toml` in the working directory, then `STATEMENTS__*`
/// environment variables such as `STATEMENTS__PAGE_SIZE` (a `.env` file is
/// loaded first).
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("statements.db")
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            page_size: default_page_size(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("statements").required(false))
            .add_source(environment())
            .build()?;

        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self, SettingsError> {
        let settings: Settings = config.try_deserialize()?;
        if settings.page_size == 0 {
            return Err(SettingsError::ZeroPageSize);
        }
        Ok(settings)
    }
}

/// `STATEMENTS__<KEY>` variables; the double underscore also separates the prefix
fn environment() -> Environment {
    Environment::with_prefix("STATEMENTS")
        .separator("__")
        .try_parsing(true)
}
