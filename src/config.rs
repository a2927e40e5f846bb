//! Client configuration.
//!
//! A small TOML file in the platform config directory holds the server base
//! URL and listing page size. Missing files are created with defaults on
//! first run; `KMEM_GALLERY_CONFIG` overrides the path for tests and
//! portable setups.

use std::fs;
use std::path::PathBuf;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";
pub const CONFIG_ENV_OVERRIDE: &str = "KMEM_GALLERY_CONFIG";

const CONFIG_DIR_NAME: &str = ".kmem-gallery";
const CONFIG_FILE_NAME: &str = "kmem-gallery.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            page_size: 20,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no suitable config directory available")]
    NoBaseDir,
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to encode default config: {0}")]
    Encode(#[from] toml::ser::Error),
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_OVERRIDE) {
        return Ok(PathBuf::from(path));
    }

    let base = BaseDirs::new().ok_or(ConfigError::NoBaseDir)?;
    Ok(base
        .config_dir()
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

/// Load the config, writing defaults first if the file does not exist yet.
pub fn load() -> Result<Config, ConfigError> {
    let path = config_path()?;

    if !path.exists() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.clone(),
                source,
            })?;
        }
        fs::write(&path, text).map_err(|source| ConfigError::Write {
            path: path.clone(),
            source,
        })?;
        return Ok(config);
    }

    let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
}
