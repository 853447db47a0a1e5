//! JSON Web Key Set handling
//!
//! - [`source`] - fetching the issuer's key set (HTTP, or any [`KeySetSource`])
//! - [`cache`] - TTL cache of resolved signing keys keyed by (issuer, kid)
//! - [`resolver`] - kid lookup through the cache with a single forced refresh
//!
//! A [`JwksDocument`] is transient: it lives only while its entries are turned
//! into [`SigningKey`]s. Signing keys are immutable and replaced wholesale
//! when the issuer rotates its keys.

pub mod cache;
pub mod resolver;
pub mod source;

pub use cache::KeyCache;
pub use resolver::{Freshness, KeySetResolver};
pub use source::{HttpKeySetSource, KeySetSource};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AuthError, Result};
use crate::jwt::TRUSTED_ALGORITHM;

/// A key set as published at an issuer's JWKS endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwksDocument {
    /// Published keys, in endpoint order
    pub keys: Vec<KeyEntry>,
}

impl JwksDocument {
    /// First entry whose `kid` equals `key_id`
    pub fn find(&self, key_id: &str) -> Option<&KeyEntry> {
        self.keys
            .iter()
            .find(|entry| entry.kid.as_deref() == Some(key_id))
    }
}

/// A single JWK entry
///
/// Only the members needed for RS256 verification are modelled; everything
/// else in the entry is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    /// Key identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Key type (`RSA` for usable entries)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kty: Option<String>,

    /// Intended algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Intended use (`sig` or `enc`)
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// RSA modulus, base64url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent, base64url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// X.509 certificate chain, standard base64 DER, leaf first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,
}

impl KeyEntry {
    /// Convert this entry into an RS256 signing key for `issuer`
    ///
    /// The leaf certificate is preferred over the modulus/exponent pair when
    /// both are published.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyMaterialInvalid`] if the entry has no `kid`, is
    /// not an RSA signing key for RS256, or its material cannot be decoded.
    pub fn to_signing_key(&self, issuer: &str, fetched_at: u64) -> Result<SigningKey> {
        let key_id = self.kid.clone().unwrap_or_default();
        let invalid = |reason: String| AuthError::KeyMaterialInvalid {
            key_id: key_id.clone(),
            reason,
        };

        if key_id.is_empty() {
            return Err(invalid("entry has no kid".to_string()));
        }
        if self.kty.as_deref() != Some("RSA") {
            return Err(invalid(format!(
                "key type {:?} is not RSA",
                self.kty.as_deref().unwrap_or("<none>")
            )));
        }
        if let Some(alg) = self.alg.as_deref()
            && alg != TRUSTED_ALGORITHM
        {
            return Err(invalid(format!("key is published for {alg}")));
        }
        if let Some(key_use) = self.key_use.as_deref()
            && key_use != "sig"
        {
            return Err(invalid(format!("key use {key_use:?} is not sig")));
        }

        let (decoding_key, material) = if let Some(certificate) =
            self.x5c.as_ref().and_then(|chain| chain.first())
        {
            let pem = certificate_pem(certificate).map_err(&invalid)?;
            let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| invalid(format!("certificate does not hold an RSA key: {e}")))?;
            (key, KeyMaterial::Certificate)
        } else if let (Some(n), Some(e)) = (self.n.as_deref(), self.e.as_deref()) {
            let key = DecodingKey::from_rsa_components(n, e)
                .map_err(|err| invalid(format!("bad modulus/exponent: {err}")))?;
            (key, KeyMaterial::Components)
        } else {
            return Err(invalid(
                "entry has neither x5c nor n/e members".to_string(),
            ));
        };

        Ok(SigningKey {
            key_id,
            issuer: issuer.to_string(),
            decoding_key,
            material,
            fetched_at,
        })
    }
}

/// Re-armour a base64 DER certificate as PEM
fn certificate_pem(certificate: &str) -> std::result::Result<String, String> {
    let der = STANDARD
        .decode(certificate.trim())
        .map_err(|e| format!("x5c is not base64: {e}"))?;
    if der.is_empty() {
        return Err("x5c certificate is empty".to_string());
    }

    let body = STANDARD.encode(der);
    let mut pem = String::with_capacity(body.len() + body.len() / 64 + 64);
    pem.push_str("-----BEGIN CERTIFICATE-----\n");
    for line in body.as_bytes().chunks(64) {
        // base64 output is ASCII, so every chunk is valid UTF-8
        pem.push_str(std::str::from_utf8(line).unwrap_or_default());
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    Ok(pem)
}

/// Where a signing key's public material came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMaterial {
    /// Leaf certificate of the `x5c` chain
    Certificate,
    /// `n`/`e` members
    Components,
}

/// A resolved RS256 public key for one (issuer, kid)
#[derive(Clone)]
pub struct SigningKey {
    key_id: String,
    issuer: String,
    decoding_key: DecodingKey,
    material: KeyMaterial,
    fetched_at: u64,
}

impl SigningKey {
    /// Key identifier
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Issuer whose key set published this key
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Where the public material came from
    pub fn material(&self) -> KeyMaterial {
        self.material
    }

    /// Unix seconds at which the key set holding this key was fetched
    pub fn fetched_at(&self) -> u64 {
        self.fetched_at
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

// Manual Debug impl to keep key material out of logs
impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("issuer", &self.issuer)
            .field("material", &self.material)
            .field("fetched_at", &self.fetched_at)
            .finish_non_exhaustive()
    }
}
