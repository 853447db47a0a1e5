//! `Authorization` header parsing

use crate::error::{AuthError, Result};

const SCHEME: &str = "bearer ";

/// Extract the token from a `Bearer <token>` authorization header value
///
/// The scheme is matched case-insensitively. Whitespace around the token is
/// ignored.
///
/// # Errors
///
/// - [`AuthError::MissingCredential`] if the header is absent or blank
/// - [`AuthError::MalformedCredential`] if it is not a bearer credential with
///   a non-empty token
///
/// # Example
///
/// ```rust
/// use taskgate_auth::bearer::extract_token;
///
/// assert_eq!(extract_token(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
/// assert!(extract_token(Some("Basic abc123")).is_err());
/// ```
pub fn extract_token(header: Option<&str>) -> Result<&str> {
    let header = header.map(str::trim).unwrap_or_default();
    if header.is_empty() {
        return Err(AuthError::MissingCredential);
    }

    let scheme_matches = header
        .get(..SCHEME.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SCHEME));
    if !scheme_matches {
        return Err(AuthError::MalformedCredential);
    }

    let token = header[SCHEME.len()..].trim();
    if token.is_empty() {
        return Err(AuthError::MalformedCredential);
    }

    Ok(token)
}
