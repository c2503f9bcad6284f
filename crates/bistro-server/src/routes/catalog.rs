//! Categories and menu items.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    handler::Handler,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use bistro_api::ApiResult;
use bistro_storage::{Category, MenuItem, NewCategory, NewMenuItem};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::remember;
use crate::cache::CacheService;
use crate::cache::policy::{self, MENU_ALL_KEY, menu_category_key};
use crate::middleware::{
    CacheTarget, HIT, Invalidate, MISS, ReadThrough, X_CACHE, invalidate, read_through,
};
use crate::server::AppState;

pub fn catalog_routes(cache: &CacheService) -> Router<AppState> {
    let category_writes =
        from_fn_with_state(Invalidate::for_policy(cache, &policy::CATEGORIES), invalidate);
    let menu_writes = from_fn_with_state(Invalidate::for_policy(cache, &policy::MENU), invalidate);

    Router::new()
        .route(
            "/categories",
            get(list_categories.layer(from_fn_with_state(
                ReadThrough::for_policy(cache, &policy::CATEGORIES),
                read_through,
            )))
            .post(create_category.layer(category_writes.clone())),
        )
        .route(
            "/categories/{id}",
            put(update_category.layer(category_writes.clone()))
                .delete(delete_category.layer(category_writes)),
        )
        .route(
            "/menu-items",
            get(list_menu_items).post(create_menu_item.layer(menu_writes)),
        )
}

async fn list_categories(
    State(state): State<AppState>,
    target: Option<Extension<CacheTarget>>,
) -> ApiResult<Json<Vec<Category>>> {
    let categories = state.store.list_categories().await?;
    remember(&state, target, &categories).await;
    Ok(Json(categories))
}

async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<NewCategory>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = state.store.create_category(input).await?;
    tracing::info!(id = %category.id, name = %category.name, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<NewCategory>,
) -> ApiResult<Json<Category>> {
    Ok(Json(state.store.update_category(id, input).await?))
}

async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.store.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
pub struct MenuQuery {
    pub category_id: Option<Uuid>,
}

/// Menu listings manage their own cache entry: one key per category filter.
async fn list_menu_items(
    State(state): State<AppState>,
    Query(query): Query<MenuQuery>,
) -> ApiResult<Response> {
    let key = match query.category_id {
        Some(id) => menu_category_key(&id.to_string()),
        None => MENU_ALL_KEY.to_string(),
    };

    if let Some(cached) = state.cache.get::<Value>(&key).await {
        return Ok(([(X_CACHE, HIT)], Json(cached)).into_response());
    }

    let items = state.store.list_menu_items(query.category_id).await?;
    let mut response = Json(&items).into_response();
    if state.cache.is_available() {
        state
            .cache
            .set_with_ttl(&key, &items, policy::MENU.ttl_secs)
            .await;
        response.headers_mut().insert(X_CACHE, MISS);
    }
    Ok(response)
}

async fn create_menu_item(
    State(state): State<AppState>,
    Json(input): Json<NewMenuItem>,
) -> ApiResult<(StatusCode, Json<MenuItem>)> {
    let item = state.store.create_menu_item(input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}
