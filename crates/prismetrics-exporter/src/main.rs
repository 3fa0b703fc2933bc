//! prismetrics exporter
//!
//! - Loads strict YAML config (`PRISMETRICS_CONFIG`, default `prismetrics.yaml`)
//! - Builds one registry + Prometheus exporter and starts the refresh loop
//! - Serves `/metrics`, `/healthz`, `/readyz`, `/stats`
//! - SIGINT/SIGTERM: mark draining, stop refresh (one final refresh), drain HTTP

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use prismetrics_core::error::{MetricsError, Result};
use prismetrics_exporter::{
    app_state,
    config,
    refresh::{register_shutdown, RefreshOptions, Signal, SignalManager},
    router,
};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::var("PRISMETRICS_CONFIG").unwrap_or_else(|_| "prismetrics.yaml".into());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .map_err(|e| MetricsError::Config(format!("server.listen must be a valid SocketAddr: {e}")))?;
    let interval = cfg.exporter.refresh_interval();

    let state = app_state::AppState::new(cfg)?;
    let exporter = state.exporter();

    // First snapshot up front so the initial scrape is not empty.
    if let Err(e) = exporter.refresh() {
        tracing::warn!(error = %e, "initial refresh failed");
    }
    exporter.start_refresh(RefreshOptions::every(interval).on_error(|e| {
        tracing::debug!(code = e.code().as_str(), "refresh error observed");
    }));

    let signals = Arc::new(SignalManager::new());
    for signal in [Signal::Interrupt, Signal::Terminate] {
        let state = state.clone();
        signals.register(signal, move |_| {
            let state = state.clone();
            async move { state.set_draining() }
        });
    }
    register_shutdown(Arc::clone(&exporter), &signals);

    let app = router::build_router(state);

    tracing::info!(%listen, "prismetrics-exporter starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| MetricsError::Internal(format!("failed to bind {listen}: {e}")))?;

    let shutdown = {
        let signals = Arc::clone(&signals);
        async move {
            signals.listen().await;
        }
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| MetricsError::Internal(format!("server failed: {e}")))?;

    tracing::info!("prismetrics-exporter stopped");
    Ok(())
}
