//! Signature and claim verification
//!
//! Checks run in a fixed order and any single failure rejects the token:
//!
//! 1. RS256 signature over `header.payload` under the resolved key
//! 2. `exp` strictly in the future (within the configured clock skew)
//! 3. `nbf`, when present, not in the future
//! 4. `iat`, when present, not in the future
//! 5. `iss` equal to the trusted issuer
//! 6. `aud` containing the expected audience, when one is configured
//!
//! The signature is checked by `jsonwebtoken`; its own time and audience
//! validation is switched off so that the checks above run against the
//! injected [`Clock`].

use jsonwebtoken::{Algorithm, TokenData, Validation, decode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::UnverifiedHeader;
use crate::clock::Clock;
use crate::error::{AuthError, Result};
use crate::jwks::SigningKey;

/// `aud` claim: a single audience or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `audience` equals (or is one of) this claim's values
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::Single(value) => value == audience,
            Self::Multiple(values) => values.iter().any(|value| value == audience),
        }
    }
}

/// Claims as they appear in the payload, before any check
#[derive(Debug, Clone, Deserialize)]
struct RawClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<Audience>,
    #[serde(default)]
    exp: Option<u64>,
    #[serde(default)]
    nbf: Option<u64>,
    #[serde(default)]
    iat: Option<u64>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

/// Claims of a token that passed every check
///
/// Only [`TokenVerifier::verify`] can produce this type, so holding one is
/// proof that signature, timing, issuer and audience were validated.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims {
    subject: String,
    issuer: String,
    audience: Option<Audience>,
    expires_at: u64,
    not_before: Option<u64>,
    issued_at: Option<u64>,
    extra: HashMap<String, Value>,
}

impl VerifiedClaims {
    /// `sub`
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// `iss`
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// `aud`, if the token carried one
    pub fn audience(&self) -> Option<&Audience> {
        self.audience.as_ref()
    }

    /// `exp`, Unix seconds
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// `nbf`, Unix seconds
    pub fn not_before(&self) -> Option<u64> {
        self.not_before
    }

    /// `iat`, Unix seconds
    pub fn issued_at(&self) -> Option<u64> {
        self.issued_at
    }

    /// Any other claim
    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.extra.get(claim)
    }

    /// All non-registered claims
    pub fn extra(&self) -> &HashMap<String, Value> {
        &self.extra
    }
}

/// Verifies token signatures and claims for one trusted issuer
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    issuer: String,
    audience: Option<String>,
    clock_skew: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    /// Verifier for tokens issued by `issuer`, with no audience check and no
    /// clock skew
    pub fn new(issuer: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: None,
            clock_skew: Duration::ZERO,
            clock,
        }
    }

    /// Require `aud` to contain `audience`
    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    /// Tolerate `skew` of clock difference on time-based claims
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// The trusted issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify `token` with `key`
    ///
    /// `header` must be the token's own unverified header; the key is only
    /// accepted if it was resolved for that header's `kid` and for the trusted
    /// issuer.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] naming the first check that failed.
    pub fn verify(
        &self,
        token: &str,
        header: &UnverifiedHeader,
        key: &SigningKey,
    ) -> Result<VerifiedClaims> {
        if key.key_id() != header.key_id() {
            return Err(AuthError::invalid_token("signing key does not match token kid"));
        }
        if key.issuer() != self.issuer {
            return Err(AuthError::invalid_token(
                "signing key was not published by the trusted issuer",
            ));
        }

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let TokenData { claims, .. } =
            decode::<RawClaims>(token, key.decoding_key(), &validation).map_err(|e| {
                debug!(key_id = key.key_id(), error = %e, "Token signature rejected");
                AuthError::invalid_token(format!("signature verification failed: {e}"))
            })?;

        self.check_claims(claims)
    }

    fn check_claims(&self, claims: RawClaims) -> Result<VerifiedClaims> {
        let now = self.clock.now_secs();
        let skew = self.clock_skew.as_secs();

        let expires_at = claims
            .exp
            .ok_or_else(|| AuthError::invalid_token("token has no exp claim"))?;
        if expires_at.saturating_add(skew) <= now {
            return Err(AuthError::invalid_token("token has expired"));
        }

        if let Some(nbf) = claims.nbf
            && nbf > now.saturating_add(skew)
        {
            return Err(AuthError::invalid_token("token is not yet valid (nbf)"));
        }

        if let Some(iat) = claims.iat
            && iat > now.saturating_add(skew)
        {
            return Err(AuthError::invalid_token("token issued in the future (iat)"));
        }

        let issuer = claims
            .iss
            .ok_or_else(|| AuthError::invalid_token("token has no iss claim"))?;
        if issuer != self.issuer {
            return Err(AuthError::invalid_token("token issuer is not trusted"));
        }

        if let Some(expected) = self.audience.as_deref() {
            let matches = claims
                .aud
                .as_ref()
                .is_some_and(|audience| audience.contains(expected));
            if !matches {
                return Err(AuthError::invalid_token(
                    "token audience does not include this API",
                ));
            }
        }

        let subject = claims
            .sub
            .filter(|sub| !sub.is_empty())
            .ok_or_else(|| AuthError::invalid_token("token has no sub claim"))?;

        Ok(VerifiedClaims {
            subject,
            issuer,
            audience: claims.aud,
            expires_at,
            not_before: claims.nbf,
            issued_at: claims.iat,
            extra: claims.extra,
        })
    }
}
