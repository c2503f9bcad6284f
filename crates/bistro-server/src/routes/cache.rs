//! Cache administration endpoints.
//!
//! - `GET /cache/stats` - counters, hit ratio, uptime and backend diagnostics
//! - `GET /cache/keys` - every live key with its TTL
//! - `GET /cache/{key}` - one cached value, 404 when absent
//! - `DELETE /cache/{key}` - drop one key
//! - `DELETE /cache/pattern/{pattern}` - drop every key matching a glob
//! - `DELETE /cache` - flush everything
//! - `POST /cache/warm` - run the warmer now
//!
//! Inspection through these routes does not move the hit/miss counters.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use bistro_api::{ApiError, ApiResult};
use serde::Serialize;
use serde_json::Value;

use crate::cache::monitor::{CacheReport, KeyInfo, TtlView};
use crate::cache::warmer::WarmReport;
use crate::server::AppState;

pub fn cache_routes() -> Router<AppState> {
    Router::new()
        .route("/cache", delete(flush))
        .route("/cache/stats", get(stats))
        .route("/cache/keys", get(keys))
        .route("/cache/warm", post(warm))
        .route("/cache/pattern/{pattern}", delete(delete_pattern))
        .route("/cache/{key}", get(get_key).delete(delete_key))
}

#[derive(Debug, Serialize)]
pub struct KeysResponse {
    pub count: usize,
    pub keys: Vec<KeyInfo>,
}

#[derive(Debug, Serialize)]
pub struct CachedValue {
    pub key: String,
    pub value: Value,
    pub ttl: TtlView,
}

#[derive(Debug, Serialize)]
pub struct KeyDeleted {
    pub key: String,
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct PatternDeleted {
    pub pattern: String,
    pub deleted: usize,
}

#[derive(Debug, Serialize)]
pub struct Flushed {
    pub flushed: bool,
}

async fn stats(State(state): State<AppState>) -> Json<CacheReport> {
    Json(state.cache.monitor().report(&state.cache).await)
}

async fn keys(State(state): State<AppState>) -> Json<KeysResponse> {
    let keys = state.cache.monitor().keys_info(&state.cache).await;
    Json(KeysResponse {
        count: keys.len(),
        keys,
    })
}

async fn get_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<CachedValue>> {
    let value = state
        .cache
        .peek::<Value>(&key)
        .await
        .ok_or_else(|| ApiError::not_found(format!("key '{key}' not found in cache")))?;
    let ttl = state.cache.ttl(&key).await.into();
    Ok(Json(CachedValue { key, value, ttl }))
}

async fn delete_key(State(state): State<AppState>, Path(key): Path<String>) -> Json<KeyDeleted> {
    let deleted = state.cache.invalidate(&key).await;
    tracing::info!(key = %key, deleted, "cache key deleted via admin");
    Json(KeyDeleted { key, deleted })
}

async fn delete_pattern(
    State(state): State<AppState>,
    Path(pattern): Path<String>,
) -> Json<PatternDeleted> {
    let deleted = state.cache.invalidate_pattern(&pattern).await;
    tracing::info!(pattern = %pattern, count = deleted, "cache pattern deleted via admin");
    Json(PatternDeleted { pattern, deleted })
}

async fn flush(State(state): State<AppState>) -> Json<Flushed> {
    let flushed = state.cache.clear().await;
    tracing::warn!(flushed, "cache flushed via admin");
    Json(Flushed { flushed })
}

async fn warm(State(state): State<AppState>) -> Json<WarmReport> {
    Json(state.warmer.warm().await)
}
