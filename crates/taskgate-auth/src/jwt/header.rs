//! Unverified token header decoding
//!
//! Only the header segment is decoded here, and only to learn which key to
//! fetch. Nothing read at this stage is trusted for authorization; the payload
//! is not touched until the signature has been checked.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Value;

use crate::error::{AuthError, Result};

/// The single signing algorithm this authorizer accepts
pub const TRUSTED_ALGORITHM: &str = "RS256";

/// Algorithm and key id read from a token header before verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedHeader {
    algorithm: String,
    key_id: String,
}

impl UnverifiedHeader {
    /// Declared algorithm (always [`TRUSTED_ALGORITHM`] once decoded)
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Key identifier (`kid`)
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

/// Split a compact JWS into its header, payload and signature segments
pub(crate) fn split_segments(token: &str) -> Result<[&str; 3]> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::malformed_token(
            "token must have exactly three segments",
        ));
    };

    if header.is_empty() || payload.is_empty() || signature.is_empty() {
        return Err(AuthError::malformed_token("token has an empty segment"));
    }

    Ok([header, payload, signature])
}

/// Decode the header of `token` without verifying anything
///
/// # Errors
///
/// - [`AuthError::MalformedToken`] if the token is not three non-empty
///   segments, the header is not base64url JSON object, or `alg`/`kid` are
///   missing
/// - [`AuthError::UnsupportedAlgorithm`] if `alg` is anything but RS256
///   (including `none` and the HMAC family)
pub fn decode_unverified(token: &str) -> Result<UnverifiedHeader> {
    let [header_segment, _, _] = split_segments(token)?;

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_segment)
        .map_err(|e| AuthError::malformed_token(format!("header is not base64url: {e}")))?;

    let header: Value = serde_json::from_slice(&header_bytes)
        .map_err(|e| AuthError::malformed_token(format!("header is not JSON: {e}")))?;
    let Value::Object(fields) = header else {
        return Err(AuthError::malformed_token("header is not a JSON object"));
    };

    let algorithm = match fields.get("alg") {
        Some(Value::String(alg)) => alg.clone(),
        Some(_) => return Err(AuthError::malformed_token("header `alg` is not a string")),
        None => return Err(AuthError::malformed_token("header has no `alg`")),
    };

    if algorithm != TRUSTED_ALGORITHM {
        return Err(AuthError::UnsupportedAlgorithm(algorithm));
    }

    let key_id = match fields.get("kid") {
        Some(Value::String(kid)) if !kid.is_empty() => kid.clone(),
        _ => return Err(AuthError::malformed_token("header has no usable `kid`")),
    };

    Ok(UnverifiedHeader { algorithm, key_id })
}
