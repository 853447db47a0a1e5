//! End-to-end `authorize` scenarios against a mock issuer
//!
//! Each test asserts both the decision and how many times the JWKS endpoint
//! was hit; credentials rejected before key resolution must not fetch.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use taskgate_auth::{AuthDecision, AuthError, Authorizer, Effect, ErrorKind, KeyMaterial};

#[tokio::test]
async fn test_valid_token_is_allowed() {
    let issuer = MockIssuer::start().await;
    issuer.serve_keys(vec![primary_jwk()], 1).await;
    let authorizer = issuer.authorizer();

    let claims = json!({
        "sub": "u1",
        "iss": ISSUER,
        "exp": now_secs() + 600,
    });
    let decision = authorizer
        .authorize(Some(&bearer(&primary_token(&claims))))
        .await;

    assert_eq!(decision.effect(), Effect::Allow);
    assert_eq!(decision.principal_id(), "u1");
    assert_eq!(decision.resource(), "*");

    let policy = serde_json::to_value(decision.to_policy()).unwrap();
    assert_eq!(policy["principalId"], "u1");
    assert_eq!(policy["policyDocument"]["Statement"][0]["Effect"], "Allow");
}

#[tokio::test]
async fn test_basic_credential_denied_without_fetch() {
    let issuer = MockIssuer::start().await;
    issuer.serve_keys(vec![primary_jwk()], 0).await;
    let authorizer = issuer.authorizer();

    assert_eq!(
        authorizer.authorize(Some("Basic abc123")).await,
        AuthDecision::deny()
    );
    assert_eq!(
        authorizer.verify(Some("Basic abc123")).await.unwrap_err(),
        AuthError::MalformedCredential
    );
}

#[tokio::test]
async fn test_missing_header_denied_without_fetch() {
    let issuer = MockIssuer::start().await;
    issuer.serve_keys(vec![primary_jwk()], 0).await;
    let authorizer = issuer.authorizer();

    assert_eq!(authorizer.authorize(None).await, AuthDecision::deny());
    assert_eq!(
        authorizer.verify(None).await.unwrap_err(),
        AuthError::MissingCredential
    );
}

#[tokio::test]
async fn test_foreign_algorithms_denied_without_fetch() {
    let issuer = MockIssuer::start().await;
    issuer.serve_keys(vec![primary_jwk()], 0).await;
    let authorizer = issuer.authorizer();
    let claims = claims_for("u1");

    let hs256 = bearer(&hs256_token(&claims));
    assert_eq!(authorizer.authorize(Some(&hs256)).await, AuthDecision::deny());
    assert_eq!(
        authorizer.verify(Some(&hs256)).await.unwrap_err(),
        AuthError::UnsupportedAlgorithm("HS256".to_string())
    );

    let unsigned = bearer(&unsigned_token(&claims));
    assert_eq!(
        authorizer.authorize(Some(&unsigned)).await,
        AuthDecision::deny()
    );
    assert_eq!(
        authorizer.verify(Some(&unsigned)).await.unwrap_err(),
        AuthError::UnsupportedAlgorithm("none".to_string())
    );
}

#[tokio::test]
async fn test_token_without_kid_denied_without_fetch() {
    let issuer = MockIssuer::start().await;
    issuer.serve_keys(vec![primary_jwk()], 0).await;
    let authorizer = issuer.authorizer();

    let token = sign_rs256(PRIMARY_KEY, None, &claims_for("u1"));
    let error = authorizer.verify(Some(&bearer(&token))).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MalformedToken);
}

#[tokio::test]
async fn test_expired_token_denied_despite_valid_signature() {
    let issuer = MockIssuer::start().await;
    issuer.serve_keys(vec![primary_jwk()], 1).await;
    let authorizer = issuer.authorizer();

    let mut claims = claims_for("u1");
    claims["iat"] = json!(now_secs() - 7200);
    claims["exp"] = json!(now_secs() - 60);
    let header = bearer(&primary_token(&claims));

    assert_eq!(authorizer.authorize(Some(&header)).await, AuthDecision::deny());
    assert_eq!(
        authorizer.verify(Some(&header)).await.unwrap_err(),
        AuthError::InvalidToken("token has expired".to_string())
    );
}

#[tokio::test]
async fn test_token_signed_by_unpublished_key_denied() {
    let issuer = MockIssuer::start().await;
    issuer.serve_keys(vec![primary_jwk()], 1).await;
    let authorizer = issuer.authorizer();
    let claims = claims_for("u1");

    // Right kid, wrong private key
    let forged = bearer(&sign_rs256(ROTATED_KEY, Some(PRIMARY_KID), &claims));
    assert_eq!(authorizer.authorize(Some(&forged)).await, AuthDecision::deny());
    assert_eq!(
        authorizer.verify(Some(&forged)).await.unwrap_err().kind(),
        ErrorKind::InvalidToken
    );
}

#[tokio::test]
async fn test_unknown_kid_denied_after_one_forced_refresh() {
    let issuer = MockIssuer::start().await;
    // Initial fill, then one forced refresh for the unknown kid
    issuer.serve_keys(vec![primary_jwk()], 2).await;
    let authorizer = issuer.authorizer();

    let allowed = bearer(&primary_token(&claims_for("u1")));
    assert!(authorizer.authorize(Some(&allowed)).await.is_allowed());

    let unknown = bearer(&rotated_token(&claims_for("u1")));
    assert_eq!(
        authorizer.verify(Some(&unknown)).await.unwrap_err(),
        AuthError::KeyNotFound {
            key_id: ROTATED_KID.to_string(),
            cached: false,
        }
    );
}

#[tokio::test]
async fn test_repeated_authorize_is_idempotent() {
    let issuer = MockIssuer::start().await;
    issuer.serve_keys(vec![primary_jwk()], 1).await;
    let authorizer = issuer.authorizer();
    let header = bearer(&primary_token(&claims_for("auth0|abc")));

    let first = authorizer.authorize(Some(&header)).await;
    let second = authorizer.authorize(Some(&header)).await;

    assert!(first.is_allowed());
    assert_eq!(first, second);
    assert_eq!(second.principal_id(), "auth0|abc");
}

#[tokio::test]
async fn test_audience_must_match_when_configured() {
    let issuer = MockIssuer::start().await;
    issuer.serve_keys(vec![primary_jwk()], 1).await;
    let authorizer = Authorizer::from_config(issuer.config().with_audience(AUDIENCE)).unwrap();

    let matching = bearer(&primary_token(&claims_for("u1")));
    assert!(authorizer.authorize(Some(&matching)).await.is_allowed());

    let mut claims = claims_for("u1");
    claims["aud"] = json!(["https://billing.example.com"]);
    let foreign = bearer(&primary_token(&claims));
    assert_eq!(authorizer.authorize(Some(&foreign)).await, AuthDecision::deny());
}

#[tokio::test]
async fn test_issuer_must_match_exactly() {
    let issuer = MockIssuer::start().await;
    issuer.serve_keys(vec![primary_jwk()], 1).await;
    let authorizer = issuer.authorizer();

    let mut claims = claims_for("u1");
    claims["iss"] = json!("https://tenant.example.com");
    let header = bearer(&primary_token(&claims));

    assert_eq!(authorizer.authorize(Some(&header)).await, AuthDecision::deny());
}

#[tokio::test]
async fn test_certificate_published_key_verifies() {
    let issuer = MockIssuer::start().await;
    issuer
        .serve_keys(vec![primary_certificate_jwk(PRIMARY_KID)], 1)
        .await;
    let authorizer = issuer.authorizer();

    let header = bearer(&primary_token(&claims_for("u1")));
    assert!(authorizer.authorize(Some(&header)).await.is_allowed());

    let key = authorizer
        .cache()
        .lookup(ISSUER, PRIMARY_KID)
        .expect("key cached after fetch");
    assert_eq!(key.material(), KeyMaterial::Certificate);
}

#[tokio::test]
async fn test_deny_decisions_are_indistinguishable() {
    let issuer = MockIssuer::start().await;
    issuer.serve_keys(vec![primary_jwk()], 1).await;
    let authorizer = issuer.authorizer();

    let mut expired = claims_for("u1");
    expired["exp"] = json!(now_secs() - 1);
    let mut wrong_issuer = claims_for("u1");
    wrong_issuer["iss"] = json!("https://evil.example.com/");

    let headers = [
        None,
        Some("Basic abc123".to_string()),
        Some(bearer(&hs256_token(&claims_for("u1")))),
        Some(bearer(&primary_token(&expired))),
        Some(bearer(&primary_token(&wrong_issuer))),
    ];

    for header in &headers {
        let decision = authorizer.authorize(header.as_deref()).await;
        assert_eq!(
            serde_json::to_value(decision.to_policy()).unwrap(),
            serde_json::to_value(AuthDecision::deny().to_policy()).unwrap()
        );
    }
}
