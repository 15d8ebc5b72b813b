use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Configuration from config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Config {
    /// Resolution order: NEXUS_URL env var, then the config file under
    /// the platform config directory, then the default local server.
    pub fn load() -> Result<Config, ConfigError> {
        if let Ok(url) = env::var("NEXUS_URL") {
            return Ok(Config {
                base_url: normalize_base_url(&url),
            });
        }
        match config_file_path() {
            Some(path) if path.exists() => Config::read_from(path),
            _ => Ok(Config {
                base_url: DEFAULT_BASE_URL.to_string(),
            }),
        }
    }

    fn read_from(path: PathBuf) -> Result<Config, ConfigError> {
        let text = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            source: e,
        })?;
        let mut config: Config =
            toml::from_str(&text).map_err(|e| ConfigError::Parse { path, source: e })?;
        config.base_url = normalize_base_url(&config.base_url);
        Ok(config)
    }
}

pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nexus-tui").join("config.toml"))
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
