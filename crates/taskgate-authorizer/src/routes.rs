//! HTTP surface
//!
//! - `POST /authorize` - token-authorizer event in, policy document out.
//!   Always answers 200 with a well-formed policy, including for unreadable
//!   or oversized events; the gateway maps `Deny` to its own rejection
//!   status.
//! - `GET /health`
//! - `GET /metrics` - Prometheus exposition, when a recorder is installed

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use taskgate_auth::{Authorizer, AuthorizerResponse};
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Upper bound on an authorizer event body
const MAX_EVENT_BYTES: usize = 16 * 1024;

/// Token authorizer event as delivered by the gateway
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAuthorizerEvent {
    /// Always `TOKEN` for token authorizers
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    /// Raw `Authorization` header value
    #[serde(default)]
    pub authorization_token: Option<String>,
    /// ARN of the method being invoked
    #[serde(default)]
    pub method_arn: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    authorizer: Arc<Authorizer>,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(authorizer: Arc<Authorizer>, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            authorizer,
            metrics,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/authorize", post(authorize))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(MAX_EVENT_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn authorize(
    State(state): State<AppState>,
    event: Result<Json<TokenAuthorizerEvent>, JsonRejection>,
) -> Json<AuthorizerResponse> {
    // An unreadable or oversized event carries no credential
    let event = match event {
        Ok(Json(event)) => event,
        Err(rejection) => {
            debug!(error = %rejection, "Unreadable authorizer event");
            TokenAuthorizerEvent::default()
        }
    };

    debug!(
        event_type = event.event_type.as_deref().unwrap_or("<none>"),
        method_arn = event.method_arn.as_deref().unwrap_or("<none>"),
        "Authorizer event received"
    );

    let decision = state
        .authorizer
        .authorize(event.authorization_token.as_deref())
        .await;
    Json(decision.to_policy())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
