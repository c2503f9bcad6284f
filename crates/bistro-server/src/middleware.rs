use std::time::Instant;

use axum::{
    Json,
    body::Body,
    extract::{MatchedPath, RawPathParams, State, rejection::RawPathParamsRejection},
    http::{HeaderName, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::cache::policy::CachePolicy;
use crate::cache::service::CacheService;

/// Response header telling clients whether the body came from the cache.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

pub const HIT: HeaderValue = HeaderValue::from_static("HIT");
pub const MISS: HeaderValue = HeaderValue::from_static("MISS");

// =============================================================================
// Read-through
// =============================================================================

/// Read-through stage configuration for one route.
#[derive(Clone, Debug)]
pub struct ReadThrough {
    pub cache: CacheService,
    /// Key template; `{name}` is replaced by the matching path parameter.
    pub key: &'static str,
    pub ttl_secs: u64,
}

impl ReadThrough {
    pub fn new(cache: CacheService, key: &'static str, ttl_secs: u64) -> Self {
        Self {
            cache,
            key,
            ttl_secs,
        }
    }

    pub fn for_policy(cache: &CacheService, policy: &CachePolicy) -> Self {
        Self::new(cache.clone(), policy.read_key, policy.ttl_secs)
    }
}

/// Key and TTL a handler should use to populate the cache after a miss.
///
/// Inserted into request extensions by [`read_through`]; absent when the
/// cache is unavailable or the key could not be resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheTarget {
    pub key: String,
    pub ttl_secs: u64,
}

impl CacheTarget {
    /// Writes the freshly computed response body into the cache.
    pub async fn store<T: Serialize + ?Sized>(&self, cache: &CacheService, value: &T) -> bool {
        cache.set_with_ttl(&self.key, value, self.ttl_secs).await
    }
}

/// Fills `{name}` placeholders from path parameters. `None` if any placeholder is left.
pub fn resolve_key<'a>(
    template: &str,
    params: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Option<String> {
    let mut key = template.to_string();
    for (name, value) in params {
        key = key.replace(&format!("{{{name}}}"), value);
    }
    (!key.contains('{')).then_some(key)
}

/// Serves GET requests from the cache when possible.
///
/// On a hit the downstream handler never runs. On a miss the request carries a
/// [`CacheTarget`] so the handler can store what it computes. Cache trouble of
/// any kind is a miss.
pub async fn read_through(
    State(config): State<ReadThrough>,
    params: Result<RawPathParams, RawPathParamsRejection>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() != Method::GET || !config.cache.is_available() {
        return next.run(req).await;
    }

    let key = match &params {
        Ok(params) => resolve_key(config.key, params.iter()),
        Err(_) => resolve_key(config.key, std::iter::empty()),
    };
    let Some(key) = key else {
        tracing::debug!(template = config.key, "unresolved cache key, bypassing cache");
        return next.run(req).await;
    };

    if let Some(cached) = config.cache.get::<Value>(&key).await {
        let mut response = Json(cached).into_response();
        response.headers_mut().insert(X_CACHE, HIT);
        return response;
    }

    req.extensions_mut().insert(CacheTarget {
        key,
        ttl_secs: config.ttl_secs,
    });
    let mut response = next.run(req).await;
    response.headers_mut().insert(X_CACHE, MISS);
    response
}

// =============================================================================
// Invalidate on write
// =============================================================================

/// Invalidation stage configuration for one write route.
#[derive(Clone, Debug)]
pub struct Invalidate {
    pub cache: CacheService,
    pub policy: CachePolicy,
}

impl Invalidate {
    pub fn for_policy(cache: &CacheService, policy: &CachePolicy) -> Self {
        Self {
            cache: cache.clone(),
            policy: *policy,
        }
    }
}

/// Extra patterns a handler attaches to its response, on top of the route's own.
#[derive(Clone, Debug, Default)]
pub struct Invalidates(pub Vec<String>);

/// Dispatches invalidation once the handler has produced a successful response.
///
/// The work runs on a background task, so the response is never held back by
/// the cache. Failed writes (non-2xx) leave the cache untouched.
pub async fn invalidate(State(config): State<Invalidate>, req: Request<Body>, next: Next) -> Response {
    let response = next.run(req).await;
    if !response.status().is_success() {
        return response;
    }

    let mut patterns = config.policy.invalidation_patterns();
    if let Some(Invalidates(extra)) = response.extensions().get::<Invalidates>() {
        for pattern in extra {
            if !patterns.contains(pattern) {
                patterns.push(pattern.clone());
            }
        }
    }
    config.cache.spawn_invalidation(patterns);
    response
}

// =============================================================================
// Request plumbing
// =============================================================================

pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    // If the incoming request already has a request-id, preserve it; otherwise generate one
    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    let Some(req_id_value) = req_id_value else {
        return next.run(req).await;
    };

    // Add to request extensions for downstream usage (e.g., logging)
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;

    // Add/propagate the request id header to response
    res.headers_mut().insert(header_name, req_id_value);

    res
}

/// Records request count and latency against the matched route template.
pub async fn http_metrics(matched: Option<MatchedPath>, req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let route = matched
        .as_ref()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(req).await;

    crate::metrics::record_http_request(
        method.as_str(),
        &route,
        response.status().as_u16(),
        started.elapsed(),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_key_fills_placeholders() {
        assert_eq!(
            resolve_key("tables:detail:{id}", [("id", "42")]),
            Some("tables:detail:42".to_string())
        );
        assert_eq!(
            resolve_key("categories:all", std::iter::empty()),
            Some("categories:all".to_string())
        );
    }

    #[test]
    fn resolve_key_rejects_missing_params() {
        assert_eq!(resolve_key("tables:detail:{id}", [("other", "1")]), None);
    }
}
