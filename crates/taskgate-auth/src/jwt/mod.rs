//! JWT parsing and verification
//!
//! Only RS256 tokens are accepted. The header is read before any key is
//! resolved so that tokens with a foreign algorithm or no `kid` are rejected
//! without touching the network.

pub mod header;
pub mod verifier;

pub use header::{TRUSTED_ALGORITHM, UnverifiedHeader, decode_unverified};
pub use verifier::{Audience, TokenVerifier, VerifiedClaims};
