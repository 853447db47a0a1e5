//! Shared helpers for authorizer integration tests
//!
//! A wiremock server stands in for the issuer's JWKS endpoint; tokens are
//! signed with the RSA fixtures under `tests/fixtures`.

#![allow(dead_code)]

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use taskgate_auth::{Authorizer, AuthorizerConfig};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const ISSUER: &str = "https://tenant.example.com/";
pub const AUDIENCE: &str = "https://todos.example.com";

pub const PRIMARY_KID: &str = "primary-2025";
pub const ROTATED_KID: &str = "rotated-2026";

pub const PRIMARY_KEY: &str = include_str!("../fixtures/primary.key.pem");
pub const PRIMARY_N: &str = include_str!("../fixtures/primary.n.txt");
pub const PRIMARY_X5C: &str = include_str!("../fixtures/primary.x5c.txt");
pub const ROTATED_KEY: &str = include_str!("../fixtures/rotated.key.pem");
pub const ROTATED_N: &str = include_str!("../fixtures/rotated.n.txt");

const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Mock issuer serving a JWKS document
pub struct MockIssuer {
    pub server: MockServer,
    pub jwks_url: String,
}

impl MockIssuer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let jwks_url = format!("{}{}", server.uri(), JWKS_PATH);
        Self { server, jwks_url }
    }

    /// Serve `keys` on every request, asserting exactly `fetches` requests
    pub async fn serve_keys(&self, keys: Vec<Value>, fetches: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .expect(fetches)
            .mount(&self.server)
            .await;
    }

    /// Serve `keys` for the next single request only
    pub async fn serve_keys_once(&self, keys: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .up_to_n_times(1)
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Answer with `template` on every request, asserting `fetches` requests
    pub async fn respond_with(&self, template: ResponseTemplate, fetches: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(template)
            .expect(fetches)
            .mount(&self.server)
            .await;
    }

    /// Configuration trusting [`ISSUER`] with keys from this server
    pub fn config(&self) -> AuthorizerConfig {
        AuthorizerConfig::new(ISSUER).with_jwks_url(self.jwks_url.clone())
    }

    pub fn authorizer(&self) -> Authorizer {
        Authorizer::from_config(self.config()).expect("valid test configuration")
    }
}

/// JWK for an RSA key published as modulus/exponent
pub fn rsa_jwk(kid: &str, modulus: &str) -> Value {
    json!({
        "kty": "RSA",
        "kid": kid,
        "use": "sig",
        "alg": "RS256",
        "n": modulus.trim(),
        "e": "AQAB",
    })
}

/// JWK for the primary key published only as a certificate chain
pub fn primary_certificate_jwk(kid: &str) -> Value {
    json!({
        "kty": "RSA",
        "kid": kid,
        "use": "sig",
        "x5c": [PRIMARY_X5C.trim()],
    })
}

pub fn primary_jwk() -> Value {
    rsa_jwk(PRIMARY_KID, PRIMARY_N)
}

pub fn rotated_jwk() -> Value {
    rsa_jwk(ROTATED_KID, ROTATED_N)
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs()
}

/// Claims valid for an hour, issued by [`ISSUER`] for [`AUDIENCE`]
pub fn claims_for(subject: &str) -> Value {
    let now = now_secs();
    json!({
        "sub": subject,
        "iss": ISSUER,
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + Duration::from_secs(3600).as_secs(),
    })
}

/// RS256 token signed with `private_key_pem` under `kid`
pub fn sign_rs256(private_key_pem: &str, kid: Option<&str>, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).expect("fixture key");
    encode(&header, claims, &key).expect("token signs")
}

pub fn primary_token(claims: &Value) -> String {
    sign_rs256(PRIMARY_KEY, Some(PRIMARY_KID), claims)
}

pub fn rotated_token(claims: &Value) -> String {
    sign_rs256(ROTATED_KEY, Some(ROTATED_KID), claims)
}

/// HS256 token whose secret is the primary key's public modulus
pub fn hs256_token(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(PRIMARY_KID.to_string());
    let key = EncodingKey::from_secret(PRIMARY_N.trim().as_bytes());
    encode(&header, claims, &key).expect("token signs")
}

/// Unsigned `alg: none` token
/// `alg: none` token; the signature segment is filler so only the algorithm
/// is wrong
pub fn unsigned_token(claims: &Value) -> String {
    let header = json!({ "alg": "none", "typ": "JWT", "kid": PRIMARY_KID });
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        URL_SAFE_NO_PAD.encode("unsigned")
    )
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
