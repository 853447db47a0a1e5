//! Key resolution through the cache

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{KeyCache, KeySetSource, SigningKey};
use crate::auth_metrics;
use crate::clock::Clock;
use crate::error::{AuthError, Result};

/// Whether a resolution may be answered from the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Use cached keys and cached key set knowledge when fresh
    AllowCached,
    /// Bypass the cache and fetch the key set
    ForceRefresh,
}

/// Resolves key ids to signing keys for the trusted issuer
///
/// Every successful fetch stores all usable entries of the key set, not only
/// the one asked for, and marks the issuer's key set as fresh. A later miss
/// for a kid while that mark is fresh fails with
/// [`AuthError::KeyNotFound`] and `cached: true`, without a network call; the
/// caller then decides whether to retry with [`Freshness::ForceRefresh`].
/// Cached kids the fetched key set no longer lists are evicted.
#[derive(Debug)]
pub struct KeySetResolver {
    issuer: String,
    source: Arc<dyn KeySetSource>,
    cache: Arc<KeyCache>,
    clock: Arc<dyn Clock>,
}

impl KeySetResolver {
    /// Create a resolver for `issuer`'s key set
    pub fn new(
        issuer: impl Into<String>,
        source: Arc<dyn KeySetSource>,
        cache: Arc<KeyCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            source,
            cache,
            clock,
        }
    }

    /// The trusted issuer keys are resolved for
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The key cache backing this resolver
    pub fn cache(&self) -> &KeyCache {
        &self.cache
    }

    /// Resolve `key_id` to a signing key
    ///
    /// # Errors
    ///
    /// - [`AuthError::KeySetUnavailable`] / [`AuthError::KeySetMalformed`]
    ///   from the fetch
    /// - [`AuthError::KeyNotFound`] if the key set has no such kid
    /// - [`AuthError::KeyMaterialInvalid`] if the matching entry is unusable
    pub async fn resolve(&self, key_id: &str, freshness: Freshness) -> Result<Arc<SigningKey>> {
        if freshness == Freshness::AllowCached {
            if let Some(key) = self.cache.lookup(&self.issuer, key_id) {
                debug!(issuer = %self.issuer, key_id, "Using cached signing key");
                return Ok(key);
            }

            if self.cache.has_fresh_key_set(&self.issuer) {
                debug!(
                    issuer = %self.issuer,
                    key_id,
                    "Key id absent from fresh cached key set"
                );
                return Err(AuthError::KeyNotFound {
                    key_id: key_id.to_string(),
                    cached: true,
                });
            }
        }

        self.fetch(key_id, freshness).await
    }

    async fn fetch(&self, key_id: &str, freshness: Freshness) -> Result<Arc<SigningKey>> {
        let forced = freshness == Freshness::ForceRefresh;
        let document = match self.source.fetch().await {
            Ok(document) => {
                auth_metrics::record_jwks_fetch(true, forced);
                document
            }
            Err(e) => {
                auth_metrics::record_jwks_fetch(false, forced);
                return Err(e);
            }
        };
        let fetched_at = self.clock.now_secs();

        let mut requested: Option<Result<Arc<SigningKey>>> = None;
        let mut stored = 0usize;
        for entry in &document.keys {
            let Some(entry_kid) = entry.kid.as_deref() else {
                continue;
            };
            let is_requested = entry_kid == key_id && requested.is_none();

            match entry.to_signing_key(&self.issuer, fetched_at) {
                Ok(key) => {
                    let key = self.cache.store(key);
                    stored += 1;
                    if is_requested {
                        requested = Some(Ok(key));
                    }
                }
                Err(e) => {
                    debug!(
                        issuer = %self.issuer,
                        key_id = entry_kid,
                        error = %e,
                        "Skipping unusable JWKS entry"
                    );
                    if is_requested {
                        requested = Some(Err(e));
                    }
                }
            }
        }
        let listed: Vec<&str> = document
            .keys
            .iter()
            .filter_map(|entry| entry.kid.as_deref())
            .collect();
        let superseded = self.cache.retain_listed(&self.issuer, &listed);
        self.cache.record_key_set(&self.issuer, fetched_at);

        info!(
            issuer = %self.issuer,
            jwks_url = self.source.location(),
            stored,
            superseded,
            forced,
            "Cached signing keys from key set"
        );

        requested.unwrap_or_else(|| {
            warn!(
                issuer = %self.issuer,
                key_id,
                "Key id not present in freshly fetched key set"
            );
            Err(AuthError::KeyNotFound {
                key_id: key_id.to_string(),
                cached: false,
            })
        })
    }
}
