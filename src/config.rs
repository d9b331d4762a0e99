use crate::error::{IngestError, Result};
use serde::Deserialize;
use std::fs;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub geocoder: GeocoderConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Fixed inter-request delay; the remote service's acceptable-use
    /// limit, not an adaptive backoff.
    pub delay_ms: u64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub endpoint: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            delay_ms: 500,
            timeout_seconds: 5,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.nugulmap.com/api/zones".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geocoder: GeocoderConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            IngestError::Config(format!("Failed to read config file '{config_path}': {e}"))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Loads `config.toml` if present, otherwise falls back to defaults.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                info!("Using default configuration ({e})");
                Config::default()
            }
        }
    }
}
