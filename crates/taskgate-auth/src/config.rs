//! Authorizer configuration
//!
//! Configuration comes from the environment (`TASKGATE_` prefix), optionally
//! layered over a TOML, YAML or JSON file. Environment variables override file
//! settings:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `TASKGATE_ISSUER` | required |
//! | `TASKGATE_JWKS_URL` | `{issuer}/.well-known/jwks.json` |
//! | `TASKGATE_AUDIENCE` | none |
//! | `TASKGATE_CLOCK_SKEW_SECS` | `0` |
//! | `TASKGATE_CACHE_TTL_SECS` | `600` |
//! | `TASKGATE_FETCH_TIMEOUT_SECS` | `5` |

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::jwks::source::parse_jwks_url;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "TASKGATE";

/// Default key cache TTL (10 minutes)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// Default JWKS fetch timeout
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 5;

/// Trust settings for one issuer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizerConfig {
    /// Trusted issuer, matched exactly against `iss`
    #[serde(default)]
    pub issuer: String,

    /// JWKS endpoint; derived from the issuer when unset
    #[serde(default)]
    pub jwks_url: Option<String>,

    /// Expected audience; `aud` is not checked when unset
    #[serde(default)]
    pub audience: Option<String>,

    /// Tolerated clock difference on `exp`, `nbf` and `iat`
    #[serde(default)]
    pub clock_skew_secs: u64,

    /// Key cache TTL
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Upper bound on one JWKS fetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

impl AuthorizerConfig {
    /// Configuration trusting `issuer`, everything else at defaults
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            jwks_url: None,
            audience: None,
            clock_skew_secs: 0,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }

    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = Some(url.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Tolerated clock difference, rounded up to whole seconds
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew_secs = whole_secs(skew);
        self
    }

    /// Key cache TTL, rounded up to whole seconds
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = whole_secs(ttl);
        self
    }

    /// JWKS fetch timeout, rounded up to whole seconds
    ///
    /// A non-zero timeout never rounds down to zero.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_secs = whole_secs(timeout);
        self
    }

    /// The configured JWKS URL, or the issuer's well-known location
    pub fn jwks_url(&self) -> String {
        match self.jwks_url.as_deref() {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!(
                "{}/.well-known/jwks.json",
                self.issuer.trim_end_matches('/')
            ),
        }
    }

    pub fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Check the configuration can be used to build an authorizer
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingIssuer`] if the issuer is empty
    /// - [`ConfigError::InvalidJwksUrl`] / [`ConfigError::InsecureJwksUrl`]
    ///   if the JWKS URL is unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::MissingIssuer);
        }
        parse_jwks_url(&self.jwks_url())?;
        Ok(())
    }

    /// Load from `TASKGATE_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable cannot be parsed or the result
    /// does not [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Load from a file, with `TASKGATE_*` environment variables taking
    /// precedence
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The file format is unsupported
    /// - The file contains invalid configuration
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = file_source(path)?;

        let config = config::Config::builder()
            .add_source(source)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }
}

/// Settings are stored in whole seconds
fn whole_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// `config` file source for `path`, format picked by extension
pub fn file_source(
    path: &Path,
) -> Result<config::File<config::FileSourceFile, config::FileFormat>, ConfigError> {
    use config::{File, FileFormat};

    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let format = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => FileFormat::Toml,
        Some("yaml" | "yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    };

    Ok(File::from(path).format(format))
}
