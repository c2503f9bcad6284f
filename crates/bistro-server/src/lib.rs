pub mod cache;
pub mod config;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod server;

use std::sync::Arc;

use bistro_storage::{MemoryStore, Store};

pub use cache::{CacheMonitor, CacheService, CacheWarmer, KvBackend};
pub use config::{
    AppConfig, CacheBackendKind, CacheConfig, PostgresStorageConfig, RedisConfig, ServerConfig,
    StorageBackend, StorageConfig, UpstashConfig,
};
pub use observability::init_tracing;
pub use server::{AppState, BistroServer, ServerBuilder, build_app};

/// Create the key/value backend for the cache from configuration.
///
/// ## Cache Modes
///
/// - **auto**: Upstash when both REST URL and token are present, otherwise disabled
/// - **upstash** / **redis**: the named backend; missing settings disable the cache
/// - **memory**: in-process map, for development and tests
/// - **disabled**: no backend
///
/// ## Graceful Degradation
///
/// `None` means the cache is off. The server starts and serves every request from
/// the store. A configured backend that is unreachable at startup is still
/// returned; its errors surface per operation as misses.
pub async fn create_kv_backend(config: &CacheConfig) -> Option<Arc<dyn KvBackend>> {
    let backend: Arc<dyn KvBackend> = match config.backend {
        CacheBackendKind::Disabled => {
            tracing::info!("cache disabled by configuration");
            return None;
        }
        CacheBackendKind::Memory => {
            tracing::info!("using in-process memory cache");
            Arc::new(cache::MemoryBackend::new())
        }
        CacheBackendKind::Auto | CacheBackendKind::Upstash => {
            let Some((url, token)) = config.upstash.credentials() else {
                tracing::warn!(
                    "Upstash REST url/token not configured, running without cache"
                );
                return None;
            };
            match cache::UpstashBackend::new(url, token, config.upstash.timeout()) {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to build Upstash client, running without cache");
                    return None;
                }
            }
        }
        CacheBackendKind::Redis => {
            let Some(url) = config.redis.url.as_deref().filter(|u| !u.is_empty()) else {
                tracing::warn!("Redis url not configured, running without cache");
                return None;
            };
            let timeout = std::time::Duration::from_millis(config.redis.timeout_ms);
            match cache::RedisBackend::connect(url, config.redis.pool_size, timeout) {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to create Redis pool, running without cache");
                    return None;
                }
            }
        }
    };

    // Test connection
    match backend.dbsize().await {
        Ok(keys) => tracing::info!(backend = backend.name(), keys, "cache backend connected"),
        Err(e) => tracing::warn!(
            backend = backend.name(),
            error = %e,
            "cache backend unreachable at startup; requests will fall through to the store"
        ),
    }
    Some(backend)
}

/// Create the system of record from configuration.
pub async fn create_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn Store>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let pg = config.postgres.to_postgres_config();
            let store = bistro_db_postgres::PostgresStore::new(pg).await?;
            tracing::info!("connected to PostgreSQL");
            Ok(Arc::new(store))
        }
    }
}
