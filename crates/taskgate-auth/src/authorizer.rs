//! The `authorize` operation
//!
//! Wires the pipeline together:
//!
//! ```text
//! header -> bearer::extract_token -> jwt::decode_unverified
//!        -> KeySetResolver (through KeyCache) -> TokenVerifier -> AuthDecision
//! ```
//!
//! Any failure short-circuits to the uniform deny. The only retry is one
//! forced key set refresh when the cached key set of the issuer is fresh but
//! lacks the token's `kid`.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::auth_metrics;
use crate::bearer::extract_token;
use crate::clock::{Clock, SystemClock};
use crate::config::AuthorizerConfig;
use crate::decision::AuthDecision;
use crate::error::{AuthError, ConfigError, Result};
use crate::jwks::{Freshness, HttpKeySetSource, KeyCache, KeySetResolver, KeySetSource, SigningKey};
use crate::jwt::{TokenVerifier, UnverifiedHeader, VerifiedClaims, decode_unverified};

/// Bearer-token authorizer for one trusted issuer
///
/// Shareable across tasks behind an [`Arc`]; the key cache is the only
/// mutable state.
#[derive(Debug)]
pub struct Authorizer {
    resolver: KeySetResolver,
    verifier: TokenVerifier,
}

impl Authorizer {
    /// Start building an authorizer from `config`
    pub fn builder(config: AuthorizerConfig) -> AuthorizerBuilder {
        AuthorizerBuilder {
            config,
            source: None,
            clock: None,
        }
    }

    /// Authorizer fetching keys over HTTP(S) with the system clock
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` does not validate.
    pub fn from_config(config: AuthorizerConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    /// The trusted issuer
    pub fn issuer(&self) -> &str {
        self.verifier.issuer()
    }

    /// The key cache
    pub fn cache(&self) -> &KeyCache {
        self.resolver.cache()
    }

    /// Decide whether the request carrying `authorization` may proceed
    ///
    /// Never fails: every error becomes [`AuthDecision::deny`], with the
    /// reason logged and counted but absent from the decision.
    pub async fn authorize(&self, authorization: Option<&str>) -> AuthDecision {
        let started = Instant::now();
        let outcome = self.verify(authorization).await;
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            Ok(claims) => {
                info!(
                    issuer = claims.issuer(),
                    subject = claims.subject(),
                    "Request authorized"
                );
                auth_metrics::record_authorize("allow", "ok", elapsed);
                AuthDecision::allow(&claims)
            }
            Err(e) => {
                let reason = e.kind();
                warn!(reason = %reason, error = %e, "Request denied");
                auth_metrics::record_authorize("deny", reason.as_str(), elapsed);
                AuthDecision::deny()
            }
        }
    }

    /// Run the pipeline and return the verified claims
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] of the first stage that failed.
    pub async fn verify(&self, authorization: Option<&str>) -> Result<VerifiedClaims> {
        let token = extract_token(authorization)?;
        let header = decode_unverified(token)?;
        let key = self.resolve_key(&header).await?;
        self.verifier.verify(token, &header, &key)
    }

    async fn resolve_key(&self, header: &UnverifiedHeader) -> Result<Arc<SigningKey>> {
        match self
            .resolver
            .resolve(header.key_id(), Freshness::AllowCached)
            .await
        {
            Err(AuthError::KeyNotFound { cached: true, .. }) => {
                debug!(
                    key_id = header.key_id(),
                    "Key id missing from cached key set, forcing one refresh"
                );
                self.resolver
                    .resolve(header.key_id(), Freshness::ForceRefresh)
                    .await
            }
            other => other,
        }
    }
}

/// Builder for [`Authorizer`]
#[derive(Debug)]
pub struct AuthorizerBuilder {
    config: AuthorizerConfig,
    source: Option<Arc<dyn KeySetSource>>,
    clock: Option<Arc<dyn Clock>>,
}

impl AuthorizerBuilder {
    /// Read key sets from `source` instead of the configured JWKS URL
    pub fn source(mut self, source: Arc<dyn KeySetSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Use `clock` instead of the system clock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the authorizer
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration does not validate or the
    /// HTTP client cannot be built.
    pub fn build(self) -> Result<Authorizer, ConfigError> {
        let config = self.config;
        config.validate()?;

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let source: Arc<dyn KeySetSource> = match self.source {
            Some(source) => source,
            None => Arc::new(HttpKeySetSource::new(
                &config.jwks_url(),
                config.fetch_timeout(),
            )?),
        };

        let cache = Arc::new(KeyCache::new(config.cache_ttl(), Arc::clone(&clock)));
        let resolver = KeySetResolver::new(
            config.issuer.clone(),
            source,
            cache,
            Arc::clone(&clock),
        );
        let verifier = TokenVerifier::new(config.issuer.clone(), clock)
            .with_audience(config.audience.clone())
            .with_clock_skew(config.clock_skew());

        info!(
            issuer = %config.issuer,
            jwks_url = %config.jwks_url(),
            audience = config.audience.as_deref().unwrap_or("<any>"),
            cache_ttl_secs = config.cache_ttl_secs,
            "Authorizer configured"
        );

        Ok(Authorizer { resolver, verifier })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_validates() {
        assert!(matches!(
            Authorizer::from_config(AuthorizerConfig::new("")),
            Err(ConfigError::MissingIssuer)
        ));
        assert!(matches!(
            Authorizer::from_config(
                AuthorizerConfig::new("https://tenant.example.com/")
                    .with_jwks_url("http://tenant.example.com/jwks")
            ),
            Err(ConfigError::InsecureJwksUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_credential_failures_deny_without_key_lookup() {
        // Closed port: any key lookup would fail, so only parsing is exercised
        let authorizer = Authorizer::from_config(
            AuthorizerConfig::new("https://tenant.example.com/")
                .with_jwks_url("http://127.0.0.1:9/jwks"),
        )
        .unwrap();

        for header in [None, Some(""), Some("Basic abc123"), Some("Bearer a.b")] {
            assert_eq!(authorizer.authorize(header).await, AuthDecision::deny());
        }
        assert!(authorizer.cache().is_empty());
        assert_eq!(authorizer.issuer(), "https://tenant.example.com/");
    }

    #[tokio::test]
    async fn test_verify_reports_stage_errors() {
        let authorizer =
            Authorizer::from_config(AuthorizerConfig::new("https://tenant.example.com/")).unwrap();

        assert_eq!(
            authorizer.verify(None).await.unwrap_err(),
            AuthError::MissingCredential
        );
        assert_eq!(
            authorizer.verify(Some("Basic abc123")).await.unwrap_err(),
            AuthError::MalformedCredential
        );
    }
}
