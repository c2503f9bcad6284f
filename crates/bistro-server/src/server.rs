use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, middleware, routing::get};
use bistro_storage::Store;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::cache::{CacheMonitor, CacheService, CacheWarmer};
use crate::{config::AppConfig, middleware as app_middleware, routes};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: CacheService,
    pub warmer: CacheWarmer,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, cache: CacheService) -> Self {
        let warmer = CacheWarmer::new(store.clone(), cache.clone());
        Self {
            store,
            cache,
            warmer,
        }
    }
}

pub struct BistroServer {
    addr: SocketAddr,
    app: Router,
    cache: CacheService,
}

pub fn build_app(state: AppState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        // Health and info endpoints
        .route("/", get(routes::health::root))
        .route("/healthz", get(routes::health::healthz))
        .route("/readyz", get(routes::health::readyz))
        .route("/metrics", get(routes::health::metrics))
        .merge(routes::cache::cache_routes())
        .merge(routes::resource_routes(&state.cache))
        .route_layer(middleware::from_fn(app_middleware::http_metrics))
        .with_state(state)
        // Outermost first: body limit -> request id -> trace -> compression -> cors
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(middleware::from_fn(app_middleware::request_id))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            use tracing::field::Empty;
                            let req_id = req
                                .extensions()
                                .get::<axum::http::HeaderValue>()
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or("")
                                .to_string();
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri(),
                                http.status_code = Empty,
                                request_id = %req_id
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                let cache = res
                                    .headers()
                                    .get(app_middleware::X_CACHE)
                                    .and_then(|v| v.to_str().ok())
                                    .unwrap_or("-");
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    cache,
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    store: Option<Arc<dyn Store>>,
    cache: Option<CacheService>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            store: None,
            cache: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Uses an already constructed store instead of the configured one.
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses an already constructed cache instead of the configured one.
    pub fn with_cache(mut self, cache: CacheService) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn build(self) -> anyhow::Result<BistroServer> {
        let store = match self.store {
            Some(store) => store,
            None => crate::create_store(&self.config.storage).await?,
        };
        let cache = match self.cache {
            Some(cache) => cache,
            None => CacheService::new(
                crate::create_kv_backend(&self.config.cache).await,
                Arc::new(CacheMonitor::new()),
            )
            .with_default_ttl(self.config.cache.default_ttl_secs),
        };

        let state = AppState::new(store, cache.clone());
        if self.config.cache.warm_on_startup {
            state.warmer.warm().await;
        }

        let app = build_app(state, &self.config);
        Ok(BistroServer {
            addr: self.addr,
            app,
            cache,
        })
    }
}

impl BistroServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        // Let in-flight invalidations land before the process exits.
        self.cache.wait_pending().await;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
