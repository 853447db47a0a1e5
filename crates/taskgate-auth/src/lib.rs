//! # Taskgate Auth - RS256 Bearer-Token Authorizer
//!
//! Authenticates the bearer token presented on every API call against the
//! trusted issuer's rotating JSON Web Key Set and turns the outcome into an
//! allow/deny decision for the request router.
//!
//! ## Pipeline
//!
//! - [`bearer`] - `Authorization: Bearer <token>` extraction
//! - [`jwt::header`] - unverified header decode (`alg` must be RS256, `kid` required)
//! - [`jwks`] - key set fetch, key cache and kid resolution
//! - [`jwt::verifier`] - signature and claim checks producing [`VerifiedClaims`]
//! - [`decision`] - [`AuthDecision`] and the gateway policy document
//! - [`authorizer`] - the [`Authorizer::authorize`] operation tying it together
//!
//! ## Failure Model
//!
//! Authorization is fail-closed. Every stage reports an [`AuthError`]; the
//! authorizer logs the error kind and returns the same [`AuthDecision::deny`]
//! regardless of which check failed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use taskgate_auth::{Authorizer, AuthorizerConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthorizerConfig::new("https://tenant.example.com/")
//!     .with_audience("https://todos.example.com");
//! let authorizer = Authorizer::from_config(config)?;
//!
//! let decision = authorizer.authorize(Some("Bearer eyJ...")).await;
//! if decision.is_allowed() {
//!     println!("principal: {}", decision.principal_id());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `metrics` - decision and JWKS fetch metrics via the `metrics` facade

pub mod auth_metrics;
pub mod authorizer;
pub mod bearer;
pub mod clock;
pub mod config;
pub mod decision;
pub mod error;
pub mod jwks;
pub mod jwt;

pub use auth_metrics::init_auth_metrics;
pub use authorizer::{Authorizer, AuthorizerBuilder};
pub use bearer::extract_token;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthorizerConfig;
pub use decision::{AuthDecision, AuthorizerResponse, Effect, PolicyDocument, Statement};
pub use error::{AuthError, ConfigError, ErrorKind, Result};
pub use jwks::{
    Freshness, HttpKeySetSource, JwksDocument, KeyCache, KeyEntry, KeyMaterial, KeySetResolver,
    KeySetSource, SigningKey,
};
pub use jwt::{Audience, TokenVerifier, UnverifiedHeader, VerifiedClaims, decode_unverified};
