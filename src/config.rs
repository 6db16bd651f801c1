//! Layered configuration.
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. `~/.config/calple/config.toml`
//! 3. `./calple.toml`
//! 4. Environment variables with the `CALPLE_` prefix (`CALPLE_DATA_DIR`, `CALPLE_LOG`)

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

const LOCAL_CONFIG: &str = "calple.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(#[from] figment::Error),
    #[error("no data directory: set `data_dir` or CALPLE_DATA_DIR")]
    NoDataDir,
}

fn default_log() -> String {
    "warn".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CalpleConfig {
    /// Directory holding the vault. Defaults to the platform data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Default tracing filter when `CALPLE_LOG` is not set.
    #[serde(default = "default_log")]
    pub log: String,
}

impl Default for CalpleConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            log: default_log(),
        }
    }
}

impl CalpleConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment().extract().map_err(ConfigError::from)
    }

    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global) = dirs::config_dir().map(|d| d.join("calple").join("config.toml")) {
            if global.exists() {
                figment = figment.merge(Toml::file(global));
            }
        }

        figment
            .merge(Toml::file(LOCAL_CONFIG))
            .merge(Env::prefixed("CALPLE_").only(&["data_dir", "log"]))
    }

    /// Configured data directory, or `<local data dir>/calple`.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_local_dir()
                .map(|d| d.join("calple"))
                .ok_or(ConfigError::NoDataDir),
        }
    }
}
