//! Service configuration
//!
//! Service settings share the `TASKGATE_` environment prefix with the
//! authorizer settings. Setting `TASKGATE_CONFIG` to a TOML, YAML or JSON
//! file loads both from that file first, with the environment overriding it.

use serde::{Deserialize, Serialize};
use std::path::Path;
use taskgate_auth::config::{ENV_PREFIX, file_source};
use taskgate_auth::{AuthorizerConfig, ConfigError};

/// Variable naming an optional configuration file
pub const CONFIG_FILE_VAR: &str = "TASKGATE_CONFIG";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// HTTP listener and logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Listen address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Default log filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Everything the service needs to start
#[derive(Debug, Clone)]
pub struct Settings {
    pub service: ServiceConfig,
    pub authorizer: AuthorizerConfig,
}

impl Settings {
    /// Load from `TASKGATE_CONFIG` (if set) and the environment
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if loading fails or the authorizer settings do
    /// not validate.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_FILE_VAR) {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    /// Load from `TASKGATE_*` environment variables only
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if loading fails or the authorizer settings do
    /// not validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        let service: ServiceConfig = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(Self {
            service,
            authorizer: AuthorizerConfig::from_env()?,
        })
    }

    /// Load from a file, with the environment taking precedence
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing or unsupported, or the
    /// settings are invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let service: ServiceConfig = config::Config::builder()
            .add_source(file_source(path)?)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(Self {
            service,
            authorizer: AuthorizerConfig::from_file(path)?,
        })
    }
}
