#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use prismetrics_exporter::{app_state::AppState, config, ops};

fn state() -> AppState {
    let cfg = config::load_from_str("version: 1\n").unwrap();
    AppState::new(cfg).unwrap()
}

async fn body(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn healthz_is_ok() {
    let resp = ops::healthz().await.into_response();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await, "ok");
}

#[tokio::test]
async fn readyz_flips_when_draining() {
    let st = state();
    let resp = ops::readyz(State(st.clone())).await.into_response();
    assert_eq!(resp.status(), StatusCode::OK);

    st.set_draining();
    let resp = ops::readyz(State(st)).await.into_response();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body(resp).await, "draining");
}

#[tokio::test]
async fn metrics_serves_last_refreshed_snapshot() {
    let st = state();
    st.registry().counter("http_requests").unwrap().inc_by(2.0).unwrap();

    // Not refreshed yet: the scrape counts but nothing is exposed.
    let resp = ops::metrics(State(st.clone())).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        ops::PROMETHEUS_CONTENT_TYPE
    );
    assert_eq!(body(resp).await, "");

    st.exporter().refresh().unwrap();
    let text = body(ops::metrics(State(st.clone())).await).await;
    assert!(text.contains("prismetrics_app_http_requests 2\n"), "{text}");
    assert!(text.contains("prismetrics_app_metrics_scrapes 1\n"), "{text}");
    assert_eq!(st.registry().counter("metrics_scrapes").unwrap().value(), 2.0);
}

#[tokio::test]
async fn stats_is_camel_case_json() {
    let st = state();
    st.exporter().refresh().unwrap();

    let resp = ops::stats(State(st)).await.into_response();
    assert_eq!(resp.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body(resp).await).unwrap();
    assert_eq!(json["refreshCount"], 1);
    assert_eq!(json["errorCount"], 0);
    assert_eq!(json["isRefreshing"], false);
    assert!(json["lastRefreshTime"].is_string());
}
