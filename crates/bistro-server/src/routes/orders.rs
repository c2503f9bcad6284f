//! Orders and the kitchen queue.
//!
//! Both surfaces update the same order records but carry different cache
//! policies: the till's writes reach tables, the kitchen's reach reports.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    handler::Handler,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, patch},
};
use bistro_api::ApiResult;
use bistro_storage::{NewOrder, Order, OrderStatus};
use uuid::Uuid;

use super::floor::StatusChange;
use super::remember;
use crate::cache::CacheService;
use crate::cache::policy;
use crate::middleware::{
    CacheTarget, Invalidate, Invalidates, ReadThrough, invalidate, read_through,
};
use crate::server::AppState;

pub fn order_routes(cache: &CacheService) -> Router<AppState> {
    let order_writes =
        from_fn_with_state(Invalidate::for_policy(cache, &policy::ORDERS), invalidate);

    Router::new()
        .route(
            "/orders",
            get(list_orders.layer(from_fn_with_state(
                ReadThrough::for_policy(cache, &policy::ORDERS),
                read_through,
            )))
            .post(create_order.layer(order_writes.clone())),
        )
        .route(
            "/orders/{id}/status",
            patch(set_order_status.layer(order_writes)),
        )
        .route(
            "/kitchen/orders",
            get(kitchen_queue.layer(from_fn_with_state(
                ReadThrough::for_policy(cache, &policy::KITCHEN),
                read_through,
            ))),
        )
        .route(
            "/kitchen/orders/{id}/status",
            patch(set_kitchen_status.layer(from_fn_with_state(
                Invalidate::for_policy(cache, &policy::KITCHEN),
                invalidate,
            ))),
        )
}

async fn list_orders(
    State(state): State<AppState>,
    target: Option<Extension<CacheTarget>>,
) -> ApiResult<Json<Vec<Order>>> {
    let orders = state.store.list_orders().await?;
    remember(&state, target, &orders).await;
    Ok(Json(orders))
}

async fn create_order(
    State(state): State<AppState>,
    Json(input): Json<NewOrder>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let order = state.store.create_order(input).await?;
    tracing::info!(
        id = %order.id,
        items = order.items.len(),
        total_cents = order.total_cents,
        "order placed"
    );
    Ok((StatusCode::CREATED, Json(order)))
}

async fn set_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(change): Json<StatusChange>,
) -> ApiResult<Json<Order>> {
    let status: OrderStatus = change.status.parse()?;
    Ok(Json(state.store.set_order_status(id, status).await?))
}

async fn kitchen_queue(
    State(state): State<AppState>,
    target: Option<Extension<CacheTarget>>,
) -> ApiResult<Json<Vec<Order>>> {
    let orders = state.store.kitchen_orders().await?;
    remember(&state, target, &orders).await;
    Ok(Json(orders))
}

/// Kitchen status changes. Closing an order frees its table, so table listings
/// are dropped as well in that case.
async fn set_kitchen_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(change): Json<StatusChange>,
) -> ApiResult<(Option<Extension<Invalidates>>, Json<Order>)> {
    let status: OrderStatus = change.status.parse()?;
    let order = state.store.set_order_status(id, status).await?;
    let extra = (order.status.is_closed() && order.table_id.is_some())
        .then(|| Extension(Invalidates(vec!["tables:*".to_string()])));
    Ok((extra, Json(order)))
}
