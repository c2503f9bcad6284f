use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    /// The service stays ready without a cache; this is informational.
    cache: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_backend: Option<&'static str>,
}

pub async fn root() -> impl IntoResponse {
    let body = serde_json::json!({
        "service": "Bistro Server",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let info = state.cache.backend_info().await;
    let body = ReadyResponse {
        status: "ready",
        cache: if info.available { "available" } else { "unavailable" },
        cache_backend: info.backend,
    };
    (StatusCode::OK, Json(body))
}

/// Prometheus text exposition.
pub async fn metrics() -> Response {
    match crate::metrics::render_metrics() {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed",
        )
            .into_response(),
    }
}
