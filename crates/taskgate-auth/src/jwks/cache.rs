//! Signing key cache
//!
//! Resolved keys are memoized per (issuer, kid) with a TTL so that a JWKS
//! round trip is not needed on every request, while bounding how long a
//! rotated-out key stays usable.
//!
//! Alongside the keys, the cache remembers when each issuer's key set was last
//! fetched in full. While that fetch is fresh, a kid that is not cached is
//! known not to have been in the key set, which lets the resolver tell a
//! just-rotated key set apart from a cold cache.
//!
//! Entries are evicted lazily: an expired entry is removed by the lookup that
//! finds it, and a fetched key set supersedes cached kids it no longer lists. Concurrent stores for the same key are last-write-wins; both
//! writers fetched the same remote key set, so either value is correct.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::SigningKey;
use crate::clock::Clock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    issuer: String,
    key_id: String,
}

/// Process-wide cache of resolved signing keys
#[derive(Debug)]
pub struct KeyCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    keys: DashMap<CacheKey, Arc<SigningKey>>,
    /// issuer -> fetch time of the last complete key set
    key_sets: DashMap<String, u64>,
}

impl KeyCache {
    /// Create an empty cache whose entries live for `ttl`
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            keys: DashMap::new(),
            key_sets: DashMap::new(),
        }
    }

    /// Entry time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, fetched_at: u64, now: u64) -> bool {
        now.saturating_sub(fetched_at) < self.ttl.as_secs()
    }

    /// Cached key for (issuer, kid), if present and younger than the TTL
    pub fn lookup(&self, issuer: &str, key_id: &str) -> Option<Arc<SigningKey>> {
        let cache_key = CacheKey {
            issuer: issuer.to_string(),
            key_id: key_id.to_string(),
        };
        let now = self.clock.now_secs();

        if let Some(entry) = self.keys.get(&cache_key) {
            if self.is_fresh(entry.fetched_at(), now) {
                return Some(Arc::clone(entry.value()));
            }
        } else {
            return None;
        }

        // Re-check under the write lock so a concurrent fresh store survives
        let evicted = self
            .keys
            .remove_if(&cache_key, |_, key| !self.is_fresh(key.fetched_at(), now));
        if evicted.is_some() {
            debug!(issuer, key_id, "Evicted expired signing key");
        }
        None
    }

    /// Insert or replace the entry for the key's (issuer, kid)
    pub fn store(&self, key: SigningKey) -> Arc<SigningKey> {
        let key = Arc::new(key);
        self.keys.insert(
            CacheKey {
                issuer: key.issuer().to_string(),
                key_id: key.key_id().to_string(),
            },
            Arc::clone(&key),
        );
        key
    }

    /// Evict cached keys of `issuer` whose kid is not in `listed`
    ///
    /// Returns the number of keys evicted.
    pub fn retain_listed(&self, issuer: &str, listed: &[&str]) -> usize {
        let mut evicted = 0usize;
        self.keys.retain(|cache_key, _| {
            let keep = cache_key.issuer != issuer || listed.contains(&cache_key.key_id.as_str());
            if !keep {
                evicted += 1;
            }
            keep
        });
        if evicted > 0 {
            debug!(issuer, evicted, "Evicted signing keys dropped from key set");
        }
        evicted
    }

    /// Record that the complete key set of `issuer` was fetched at `fetched_at`
    pub fn record_key_set(&self, issuer: &str, fetched_at: u64) {
        self.key_sets.insert(issuer.to_string(), fetched_at);
    }

    /// Whether the last complete key set fetch for `issuer` is within the TTL
    pub fn has_fresh_key_set(&self, issuer: &str) -> bool {
        let now = self.clock.now_secs();
        self.key_sets
            .get(issuer)
            .is_some_and(|fetched_at| self.is_fresh(*fetched_at, now))
    }

    /// Number of cached keys, expired ones included
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys are cached
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Drop every cached key and key set marker
    pub fn clear(&self) {
        self.keys.clear();
        self.key_sets.clear();
        debug!("Signing key cache cleared");
    }
}
