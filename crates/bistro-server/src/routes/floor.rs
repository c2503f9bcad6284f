//! Dining tables.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    handler::Handler,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, patch},
};
use bistro_api::{ApiError, ApiResult};
use bistro_storage::{DiningTable, NewTable, TableStatus};
use serde::Deserialize;
use uuid::Uuid;

use super::remember;
use crate::cache::CacheService;
use crate::cache::policy;
use crate::middleware::{CacheTarget, Invalidate, ReadThrough, invalidate, read_through};
use crate::server::AppState;

/// Body of a status change; the value is parsed by the domain type.
#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

pub fn floor_routes(cache: &CacheService) -> Router<AppState> {
    let table_writes =
        from_fn_with_state(Invalidate::for_policy(cache, &policy::TABLES), invalidate);

    Router::new()
        .route(
            "/tables",
            get(list_tables.layer(from_fn_with_state(
                ReadThrough::for_policy(cache, &policy::TABLES),
                read_through,
            )))
            .post(create_table.layer(table_writes.clone())),
        )
        .route(
            "/tables/{id}",
            get(get_table.layer(from_fn_with_state(
                ReadThrough::for_policy(cache, &policy::TABLE_DETAIL),
                read_through,
            ))),
        )
        .route(
            "/tables/{id}/status",
            patch(set_table_status.layer(table_writes)),
        )
}

async fn list_tables(
    State(state): State<AppState>,
    target: Option<Extension<CacheTarget>>,
) -> ApiResult<Json<Vec<DiningTable>>> {
    let tables = state.store.list_tables().await?;
    remember(&state, target, &tables).await;
    Ok(Json(tables))
}

async fn get_table(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    target: Option<Extension<CacheTarget>>,
) -> ApiResult<Json<DiningTable>> {
    let table = state
        .store
        .get_table(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("table {id} not found")))?;
    remember(&state, target, &table).await;
    Ok(Json(table))
}

async fn create_table(
    State(state): State<AppState>,
    Json(input): Json<NewTable>,
) -> ApiResult<(StatusCode, Json<DiningTable>)> {
    let table = state.store.create_table(input).await?;
    Ok((StatusCode::CREATED, Json(table)))
}

async fn set_table_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(change): Json<StatusChange>,
) -> ApiResult<Json<DiningTable>> {
    let status: TableStatus = change.status.parse()?;
    let table = state.store.set_table_status(id, status).await?;
    tracing::debug!(%id, status = %table.status, "table status changed");
    Ok(Json(table))
}
