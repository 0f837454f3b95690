//! Application configuration.
//!
//! Configuration loads from a YAML file layered under environment
//! variables, with working defaults when neither is present.

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for the configuration file path.
pub const CONFIG_ENV_VAR: &str = "INFLIGHT_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "INFLIGHT";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "INFLIGHT_LOG";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transport configuration.
    pub transport: TransportConfig,
}

/// In-process transport configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Capacity of the inbound message channel.
    pub channel_capacity: usize,
    /// Capacity of the acknowledgment channel.
    pub ack_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            ack_capacity: 1024,
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Sources, later overriding earlier:
    /// 1. `config.yaml` in the current directory (if present)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `INFLIGHT_CONFIG` (if set)
    /// 4. Environment variables with the `INFLIGHT` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.transport.channel_capacity, 1024);
        assert_eq!(config.transport.ack_capacity, 1024);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        writeln!(file, "transport:\n  channel_capacity: 16").unwrap();

        let config = Config::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.transport.channel_capacity, 16);
        // Unspecified fields keep their defaults.
        assert_eq!(config.transport.ack_capacity, 1024);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let result = Config::load(Some("/nonexistent/inflight.yaml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
