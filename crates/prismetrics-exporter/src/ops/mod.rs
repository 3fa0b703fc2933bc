//! Operational HTTP endpoints.
//!
//! - `/healthz` : liveness
//! - `/readyz`  : readiness (503 when draining)
//! - `/metrics` : Prometheus text format
//! - `/stats`   : exporter stats as JSON

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use prismetrics_core::error::MetricsError;

use crate::app_state::AppState;

pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    } else {
        (StatusCode::OK, "ready")
    }
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    // Rendering waits on the exposition lock, which a refresh may hold for
    // a while; keep that wait off the async workers.
    let rendered = tokio::task::spawn_blocking(move || state.scrape())
        .await
        .map_err(|e| MetricsError::Internal(format!("render task failed: {e}")))
        .and_then(|r| r);
    match rendered {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "metrics render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.code().as_str()).into_response()
        }
    }
}

pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.exporter().get_stats())
}
