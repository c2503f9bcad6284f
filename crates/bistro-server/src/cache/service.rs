//! Fail-soft cache API used by middleware, handlers and the warmer.
//!
//! No method returns `Result`. A missing backend or a backend error collapses
//! to the same answer an empty cache would give (`None`, `false`, `0`, empty
//! list), so a cache outage can only cost latency, never correctness.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;

use super::backend::{KeyTtl, KvBackend};
use super::monitor::CacheMonitor;

/// TTL applied when the caller does not choose one.
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Best-effort backend diagnostics for `/cache/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct BackendInfo {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct CacheService {
    backend: Option<Arc<dyn KvBackend>>,
    monitor: Arc<CacheMonitor>,
    default_ttl: u64,
    pending: TaskTracker,
    draining: Arc<Mutex<()>>,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl CacheService {
    pub fn new(backend: Option<Arc<dyn KvBackend>>, monitor: Arc<CacheMonitor>) -> Self {
        Self {
            backend,
            monitor,
            default_ttl: DEFAULT_TTL_SECS,
            pending: TaskTracker::new(),
            draining: Arc::new(Mutex::new(())),
        }
    }

    /// A service with no backend; every operation is a miss or a no-op.
    pub fn disabled() -> Self {
        Self::new(None, Arc::new(CacheMonitor::new()))
    }

    pub fn with_default_ttl(mut self, ttl_secs: u64) -> Self {
        self.default_ttl = ttl_secs;
        self
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn monitor(&self) -> &Arc<CacheMonitor> {
        &self.monitor
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    /// Reads and decodes a value. Anything other than a decodable hit counts as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.peek(key).await;
        if value.is_some() {
            self.monitor.record_hit();
        } else {
            self.monitor.record_miss();
        }
        value
    }

    /// Same as [`get`](Self::get) without touching the hit/miss counters.
    pub async fn peek<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let Some(backend) = &self.backend else {
            tracing::debug!(key, "cache disabled, skipping get");
            return None;
        };

        let raw = match backend.get(key).await {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => {
                tracing::debug!(key, "cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cache get failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key, "cache hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "undecodable cache entry, dropping it");
                if let Err(e) = backend.del(key).await {
                    tracing::warn!(key, error = %e, "failed to drop undecodable entry");
                }
                None
            }
        }
    }

    /// Stores a value under the default TTL.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    pub async fn set_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> bool {
        let Some(backend) = &self.backend else {
            tracing::debug!(key, "cache disabled, skipping set");
            return false;
        };
        if ttl_secs == 0 {
            tracing::warn!(key, "refusing to cache with a zero TTL");
            return false;
        }

        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache value is not serializable");
                return false;
            }
        };

        match backend.set_ex(key, &encoded, ttl_secs).await {
            Ok(()) => {
                self.monitor.record_set();
                tracing::debug!(key, ttl_secs, "cache set");
                true
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cache set failed");
                false
            }
        }
    }

    /// Deletes one key; `true` only if something was removed.
    pub async fn invalidate(&self, key: &str) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        match backend.del(key).await {
            Ok(removed) => {
                self.monitor.record_invalidations(removed as u64);
                tracing::debug!(key, removed, "cache key invalidated");
                removed > 0
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cache invalidate failed");
                false
            }
        }
    }

    /// Deletes every key matching a glob pattern and returns how many were removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let Some(backend) = &self.backend else {
            return 0;
        };

        let keys = match backend.keys(pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(pattern, error = %e, "cache key scan failed");
                return 0;
            }
        };
        if keys.is_empty() {
            tracing::debug!(pattern, "no cache keys matched");
            return 0;
        }

        match backend.del_many(&keys).await {
            Ok(removed) => {
                self.monitor.record_invalidations(removed as u64);
                tracing::debug!(pattern, count = removed, "cache pattern invalidated");
                removed
            }
            Err(e) => {
                tracing::warn!(pattern, error = %e, "cache pattern delete failed");
                0
            }
        }
    }

    /// Runs every pattern concurrently; one failing pattern does not stop the rest.
    ///
    /// Overlapping patterns are fine: a key is only counted by the delete that
    /// actually removed it.
    pub async fn invalidate_patterns(&self, patterns: &[String]) -> usize {
        join_all(patterns.iter().map(|p| self.invalidate_pattern(p)))
            .await
            .into_iter()
            .sum()
    }

    /// Dispatches an invalidation in the background and returns immediately.
    pub fn spawn_invalidation(&self, patterns: Vec<String>) {
        if patterns.is_empty() || self.backend.is_none() {
            return;
        }
        let cache = self.clone();
        self.pending.spawn(async move {
            let removed = cache.invalidate_patterns(&patterns).await;
            tracing::debug!(?patterns, count = removed, "background invalidation finished");
        });
    }

    /// Waits for every background invalidation dispatched so far.
    ///
    /// Callers are serialized: the tracker is reopened after each drain, so a
    /// second caller must not close it while the first is still waiting.
    pub async fn wait_pending(&self) {
        let _draining = self.draining.lock().await;
        self.pending.close();
        self.pending.wait().await;
        self.pending.reopen();
    }

    /// Flushes the whole keyspace.
    pub async fn clear(&self) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        match backend.flush().await {
            Ok(()) => {
                tracing::info!("cache flushed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "cache flush failed");
                false
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        backend.exists(key).await.unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "cache exists failed");
            false
        })
    }

    /// Remaining TTL; reads as [`KeyTtl::Missing`] when the cache cannot answer.
    pub async fn ttl(&self, key: &str) -> KeyTtl {
        let Some(backend) = &self.backend else {
            return KeyTtl::Missing;
        };
        backend.ttl(key).await.unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "cache ttl failed");
            KeyTtl::Missing
        })
    }

    /// Resets a key's expiry; `false` if the key is gone or the cache is unavailable.
    pub async fn extend(&self, key: &str, ttl_secs: u64) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        backend.expire(key, ttl_secs).await.unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "cache expire failed");
            false
        })
    }

    pub async fn keys(&self, pattern: &str) -> Vec<String> {
        let Some(backend) = &self.backend else {
            return Vec::new();
        };
        backend.keys(pattern).await.unwrap_or_else(|e| {
            tracing::warn!(pattern, error = %e, "cache keys failed");
            Vec::new()
        })
    }

    pub async fn backend_info(&self) -> BackendInfo {
        let Some(backend) = &self.backend else {
            return BackendInfo {
                available: false,
                backend: None,
                keys: None,
                error: None,
            };
        };
        match backend.dbsize().await {
            Ok(keys) => BackendInfo {
                available: true,
                backend: Some(backend.name()),
                keys: Some(keys),
                error: None,
            },
            Err(e) => BackendInfo {
                available: true,
                backend: Some(backend.name()),
                keys: None,
                error: Some(e.to_string()),
            },
        }
    }
}
