use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::Config;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/statehost/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("statehost").join("config.toml")
    }

    /// Loads configuration from the default config file.
    ///
    /// - If the file doesn't exist, returns `Config::default()`.
    /// - If the file exists, parses it as TOML and validates.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Config::default());
        }

        Self::load_from(&path)
    }

    /// Loads and validates configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - Channel buffers can hold at least one item
    /// - At least one intent may run at a time
    pub fn validate(&self) -> Result<(), ConfigError> {
        let container = &self.container;

        if container.error_buffer_size == 0 {
            return Err(ConfigError::ValidationError {
                message: "container.error_buffer_size must be greater than zero".to_string(),
            });
        }

        if container.side_effect_buffer_size == 0 {
            return Err(ConfigError::ValidationError {
                message: "container.side_effect_buffer_size must be greater than zero"
                    .to_string(),
            });
        }

        if container.intent_concurrency == 0 {
            return Err(ConfigError::ValidationError {
                message: "container.intent_concurrency must be at least 1".to_string(),
            });
        }

        if self.test.timeout_ms == 0 {
            return Err(ConfigError::ValidationError {
                message: "test.timeout_ms must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
