//! API routes modules.
//!
//! Organized by functionality:
//! - `health` - liveness, readiness and Prometheus metrics
//! - `cache` - cache administration under `/cache`
//! - `catalog` - categories and menu items
//! - `floor` - dining tables
//! - `orders` - orders and the kitchen queue
//! - `settings` - restaurant settings
//!
//! Resource routes wire their cache policy per handler: GET handlers sit behind
//! the read-through stage, write handlers behind the invalidation stage.

pub mod cache;
pub mod catalog;
pub mod floor;
pub mod health;
pub mod orders;
pub mod settings;

use axum::{Extension, Router};
use serde::Serialize;

use crate::cache::CacheService;
use crate::middleware::CacheTarget;
use crate::server::AppState;

/// All business routes, each carrying its cache policy.
pub fn resource_routes(cache: &CacheService) -> Router<AppState> {
    Router::new()
        .merge(catalog::catalog_routes(cache))
        .merge(floor::floor_routes(cache))
        .merge(orders::order_routes(cache))
        .merge(settings::settings_routes(cache))
}

/// Populates the cache after a read-through miss. No-op on a cache bypass.
async fn remember<T: Serialize + ?Sized>(
    state: &AppState,
    target: Option<Extension<CacheTarget>>,
    value: &T,
) {
    if let Some(Extension(target)) = target {
        target.store(&state.cache, value).await;
    }
}
