//! Error taxonomy for the authorizer
//!
//! Every stage of the verification pipeline fails with an [`AuthError`]. The
//! [`Authorizer`](crate::Authorizer) catches all of them and turns them into a
//! uniform `Deny` decision, so the variants exist for operators (logs, metrics)
//! and for library callers that use [`Authorizer::verify`](crate::Authorizer::verify)
//! directly. Variants carry identifiers and upstream error text but never the
//! raw token, signature bytes or key material.

use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = AuthError> = std::result::Result<T, E>;

/// Failure of a single authorization attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The authorization header was absent or empty
    #[error("authorization header is missing")]
    MissingCredential,

    /// The authorization header is not of the form `Bearer <token>`
    #[error("authorization header is not a bearer credential")]
    MalformedCredential,

    /// The token is not three base64url segments with a decodable header
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The token declares an algorithm other than RS256
    #[error("unsupported token algorithm `{0}`")]
    UnsupportedAlgorithm(String),

    /// The JWKS endpoint could not be reached or answered with an error status
    #[error("key set unavailable from {url}: {reason}")]
    KeySetUnavailable { url: String, reason: String },

    /// The JWKS endpoint answered with something that is not a key set
    #[error("key set from {url} is malformed: {reason}")]
    KeySetMalformed { url: String, reason: String },

    /// No key with the token's `kid` exists in the issuer's key set
    ///
    /// `cached` is true when the absence was concluded from a key set that is
    /// still fresh in the cache rather than from a network fetch. Only that
    /// case is worth a single forced refresh.
    #[error("key `{key_id}` not found in key set")]
    KeyNotFound { key_id: String, cached: bool },

    /// The matching key entry cannot be turned into an RS256 public key
    #[error("key material for `{key_id}` is invalid: {reason}")]
    KeyMaterialInvalid { key_id: String, reason: String },

    /// Signature or claim validation failed
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

impl AuthError {
    /// Stable classification of this error, for logs and metric labels
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredential => ErrorKind::MissingCredential,
            Self::MalformedCredential => ErrorKind::MalformedCredential,
            Self::MalformedToken(_) => ErrorKind::MalformedToken,
            Self::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            Self::KeySetUnavailable { .. } => ErrorKind::KeySetUnavailable,
            Self::KeySetMalformed { .. } => ErrorKind::KeySetMalformed,
            Self::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            Self::KeyMaterialInvalid { .. } => ErrorKind::KeyMaterialInvalid,
            Self::InvalidToken(_) => ErrorKind::InvalidToken,
        }
    }

    pub(crate) fn invalid_token(reason: impl Into<String>) -> Self {
        Self::InvalidToken(reason.into())
    }

    pub(crate) fn malformed_token(reason: impl Into<String>) -> Self {
        Self::MalformedToken(reason.into())
    }
}

/// Error classification without context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingCredential,
    MalformedCredential,
    MalformedToken,
    UnsupportedAlgorithm,
    KeySetUnavailable,
    KeySetMalformed,
    KeyNotFound,
    KeyMaterialInvalid,
    InvalidToken,
}

impl ErrorKind {
    /// snake_case label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::MalformedCredential => "malformed_credential",
            Self::MalformedToken => "malformed_token",
            Self::UnsupportedAlgorithm => "unsupported_algorithm",
            Self::KeySetUnavailable => "key_set_unavailable",
            Self::KeySetMalformed => "key_set_malformed",
            Self::KeyNotFound => "key_not_found",
            Self::KeyMaterialInvalid => "key_material_invalid",
            Self::InvalidToken => "invalid_token",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration errors, raised when an [`Authorizer`](crate::Authorizer) is built
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Trusted issuer missing or empty
    #[error("a trusted issuer must be configured")]
    MissingIssuer,

    /// JWKS URL could not be parsed
    #[error("invalid JWKS URL `{url}`: {reason}")]
    InvalidJwksUrl { url: String, reason: String },

    /// JWKS URL uses plain HTTP for a non-loopback host
    #[error("JWKS URL `{0}` must use HTTPS (HTTP only allowed for loopback hosts)")]
    InsecureJwksUrl(String),

    /// HTTP client construction failed
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    /// Configuration file not found
    #[error("configuration file not found: {0}")]
    FileNotFound(std::path::PathBuf),

    /// Configuration file extension is not toml, yaml/yml or json
    #[error("unsupported configuration file format: {0}")]
    UnsupportedFormat(std::path::PathBuf),

    /// Loading or deserializing configuration failed
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels_are_snake_case() {
        let errors = [
            AuthError::MissingCredential,
            AuthError::MalformedCredential,
            AuthError::malformed_token("x"),
            AuthError::UnsupportedAlgorithm("HS256".into()),
            AuthError::KeySetUnavailable {
                url: "u".into(),
                reason: "r".into(),
            },
            AuthError::KeySetMalformed {
                url: "u".into(),
                reason: "r".into(),
            },
            AuthError::KeyNotFound {
                key_id: "k".into(),
                cached: false,
            },
            AuthError::KeyMaterialInvalid {
                key_id: "k".into(),
                reason: "r".into(),
            },
            AuthError::invalid_token("x"),
        ];

        for error in &errors {
            let label = error.kind().as_str();
            assert!(label.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
        assert_eq!(
            AuthError::MissingCredential.kind().to_string(),
            "missing_credential"
        );
    }

    #[test]
    fn test_key_not_found_message_names_key() {
        let error = AuthError::KeyNotFound {
            key_id: "2024-rotation".into(),
            cached: true,
        };
        assert_eq!(error.to_string(), "key `2024-rotation` not found in key set");
    }
}
