//! Key set fetching
//!
//! [`KeySetSource`] is the seam between key resolution and the network. The
//! production implementation, [`HttpKeySetSource`], issues one bounded GET per
//! fetch against the issuer's well-known JWKS URL.
//!
//! # Security Considerations
//!
//! - HTTPS required for JWKS endpoints (HTTP only for loopback hosts)
//! - Every fetch is bounded by a timeout; expiry surfaces as
//!   [`AuthError::KeySetUnavailable`]
//! - Redirects are not followed, so the configured URL is the only origin keys
//!   are ever read from

use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{error, info};
use url::{Host, Url};

use super::JwksDocument;
use crate::error::{AuthError, ConfigError, Result};

/// Somewhere an issuer's key set can be read from
#[async_trait]
pub trait KeySetSource: Send + Sync + std::fmt::Debug {
    /// Fetch the current key set
    ///
    /// # Errors
    ///
    /// - [`AuthError::KeySetUnavailable`] if the key set cannot be retrieved
    /// - [`AuthError::KeySetMalformed`] if what was retrieved is not a key set
    async fn fetch(&self) -> Result<JwksDocument>;

    /// Location of the key set, for logs
    fn location(&self) -> &str;
}

/// JWKS endpoint reached over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpKeySetSource {
    url: Url,
    client: reqwest::Client,
}

impl HttpKeySetSource {
    /// Create a source for `jwks_url` with a per-fetch `timeout`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the URL does not parse, uses plain HTTP for
    /// a non-loopback host, or the HTTP client cannot be built.
    pub fn new(jwks_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let url = parse_jwks_url(jwks_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("taskgate-auth/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { url, client })
    }

    fn unavailable(&self, reason: impl Into<String>) -> AuthError {
        AuthError::KeySetUnavailable {
            url: self.url.to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> Result<JwksDocument> {
        info!(jwks_url = %self.url, "Fetching JWKS from endpoint");

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                };
                error!(jwks_url = %self.url, error = %reason, "Failed to fetch JWKS");
                self.unavailable(reason)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                jwks_url = %self.url,
                status = %status,
                "JWKS endpoint returned error status"
            );
            return Err(self.unavailable(format!("endpoint returned status {status}")));
        }

        let body = response.bytes().await.map_err(|e| {
            error!(jwks_url = %self.url, error = %e, "Failed to read JWKS body");
            self.unavailable(e.to_string())
        })?;

        let document: JwksDocument = serde_json::from_slice(&body).map_err(|e| {
            error!(jwks_url = %self.url, error = %e, "Failed to parse JWKS JSON");
            AuthError::KeySetMalformed {
                url: self.url.to_string(),
                reason: e.to_string(),
            }
        })?;

        info!(
            jwks_url = %self.url,
            key_count = document.keys.len(),
            "Successfully fetched JWKS"
        );

        Ok(document)
    }

    fn location(&self) -> &str {
        self.url.as_str()
    }
}

/// Parse a JWKS URL, requiring HTTPS unless the host is loopback
pub(crate) fn parse_jwks_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidJwksUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback(&url) => Ok(url),
        "http" => Err(ConfigError::InsecureJwksUrl(raw.to_string())),
        other => Err(ConfigError::InvalidJwksUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme `{other}`"),
        }),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => false,
    }
}
