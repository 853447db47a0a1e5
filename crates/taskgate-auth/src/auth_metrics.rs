//! Authorizer metrics
//!
//! Enable with the `metrics` feature flag. Requires a `metrics` recorder
//! to be installed (e.g., via `metrics-exporter-prometheus`).
//!
//! ## Metrics Provided
//!
//! - `taskgate_authorize_total` - Counter of decisions (labels: effect, reason)
//! - `taskgate_authorize_duration_seconds` - Histogram of decision latency
//! - `taskgate_jwks_fetch_total` - Counter of key set fetches (labels: outcome, forced)
//!
//! Without the feature every recorder below compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};

#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static INIT: Once = Once::new();

/// Register metric descriptions. Idempotent; call once at startup.
///
/// ```rust
/// taskgate_auth::init_auth_metrics();
/// ```
#[cfg(feature = "metrics")]
pub fn init_auth_metrics() {
    INIT.call_once(|| {
        describe_counter!(
            "taskgate_authorize_total",
            "Authorization decisions by effect and deny reason"
        );
        describe_histogram!(
            "taskgate_authorize_duration_seconds",
            "Time to reach an authorization decision in seconds"
        );
        describe_counter!(
            "taskgate_jwks_fetch_total",
            "Key set fetches by outcome, split into cache fills and forced refreshes"
        );
    });
}

/// Record one authorization decision
///
/// `reason` is `"ok"` for allows and an [`ErrorKind`](crate::ErrorKind)
/// label for denies.
#[cfg(feature = "metrics")]
pub(crate) fn record_authorize(effect: &'static str, reason: &'static str, duration_seconds: f64) {
    counter!(
        "taskgate_authorize_total",
        "effect" => effect,
        "reason" => reason
    )
    .increment(1);
    histogram!("taskgate_authorize_duration_seconds").record(duration_seconds);
}

/// Record one key set fetch
#[cfg(feature = "metrics")]
pub(crate) fn record_jwks_fetch(success: bool, forced: bool) {
    let outcome = if success { "success" } else { "failure" };
    let forced = if forced { "true" } else { "false" };
    counter!(
        "taskgate_jwks_fetch_total",
        "outcome" => outcome,
        "forced" => forced
    )
    .increment(1);
}

#[cfg(not(feature = "metrics"))]
#[allow(missing_docs)]
pub fn init_auth_metrics() {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_authorize(_effect: &'static str, _reason: &'static str, _duration_seconds: f64) {
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_jwks_fetch(_success: bool, _forced: bool) {}
