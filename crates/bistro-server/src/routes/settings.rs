use axum::{
    Extension, Json, Router, extract::State, handler::Handler, middleware::from_fn_with_state,
    routing::get,
};
use bistro_api::ApiResult;
use bistro_storage::Settings;

use super::remember;
use crate::cache::CacheService;
use crate::cache::policy;
use crate::middleware::{CacheTarget, Invalidate, ReadThrough, invalidate, read_through};
use crate::server::AppState;

pub fn settings_routes(cache: &CacheService) -> Router<AppState> {
    Router::new().route(
        "/settings",
        get(get_settings.layer(from_fn_with_state(
            ReadThrough::for_policy(cache, &policy::SETTINGS),
            read_through,
        )))
        .put(update_settings.layer(from_fn_with_state(
            Invalidate::for_policy(cache, &policy::SETTINGS),
            invalidate,
        ))),
    )
}

async fn get_settings(
    State(state): State<AppState>,
    target: Option<Extension<CacheTarget>>,
) -> ApiResult<Json<Settings>> {
    let settings = state.store.get_settings().await?;
    remember(&state, target, &settings).await;
    Ok(Json(settings))
}

/// Merges the given values into the stored settings and returns the result.
async fn update_settings(
    State(state): State<AppState>,
    Json(values): Json<Settings>,
) -> ApiResult<Json<Settings>> {
    Ok(Json(state.store.update_settings(values).await?))
}
