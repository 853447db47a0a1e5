//! Taskgate token authorizer service
//!
//! Serves gateway token-authorizer events over HTTP, backed by
//! [`taskgate_auth::Authorizer`]. Configured entirely through `TASKGATE_*`
//! environment variables or the file named by `TASKGATE_CONFIG`.

mod config;
mod logging;
mod routes;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use taskgate_auth::Authorizer;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Settings;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;
    logging::init(&settings.service).context("failed to initialize logging")?;

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;
    taskgate_auth::init_auth_metrics();

    let authorizer =
        Authorizer::from_config(settings.authorizer).context("invalid authorizer configuration")?;
    let app = routes::router(AppState::new(Arc::new(authorizer), Some(metrics)));

    let listener = TcpListener::bind(&settings.service.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", settings.service.bind_address))?;
    info!(
        bind_address = %settings.service.bind_address,
        version = env!("CARGO_PKG_VERSION"),
        "Taskgate authorizer listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Taskgate authorizer stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
