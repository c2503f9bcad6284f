//! Process-lifetime cache counters and introspection.
//!
//! One `CacheMonitor` is created at startup and shared as `Arc<CacheMonitor>`
//! between the [`CacheService`] (which records) and the admin routes (which
//! read). Every counter update is mirrored to the `metrics` facade so the
//! same numbers show up on `/metrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

use super::backend::KeyTtl;
use super::service::{BackendInfo, CacheService};
use crate::metrics;

/// Sentinel reported as `hit_ratio` before the first lookup.
pub const NOT_APPLICABLE: &str = "N/A";

/// Sentinel reported as a key's TTL when it never expires.
pub const NO_EXPIRY: &str = "no expiry";

#[derive(Debug)]
pub struct CacheMonitor {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    invalidations: AtomicU64,
    started_at: RwLock<Instant>,
}

impl Default for CacheMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the counters, without backend diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub invalidations: u64,
}

impl CounterSnapshot {
    /// `hits / (hits + misses)`, or `None` before any lookup.
    pub fn hit_ratio(&self) -> Option<f64> {
        let lookups = self.hits + self.misses;
        (lookups > 0).then(|| self.hits as f64 / lookups as f64)
    }
}

/// Body of `GET /cache/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub invalidations: u64,
    pub hit_ratio: String,
    pub uptime: String,
    pub uptime_secs: u64,
    pub backend: BackendInfo,
}

/// Remaining lifetime as shown to operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TtlView {
    Seconds(u64),
    Label(&'static str),
}

impl From<KeyTtl> for TtlView {
    fn from(ttl: KeyTtl) -> Self {
        match ttl {
            KeyTtl::Expires(secs) => TtlView::Seconds(secs),
            KeyTtl::Persistent => TtlView::Label(NO_EXPIRY),
            KeyTtl::Missing => TtlView::Label("expired"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyInfo {
    pub key: String,
    pub ttl: TtlView,
}

impl CacheMonitor {
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            started_at: RwLock::new(Instant::now()),
        }
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_hit();
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_miss();
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_set();
    }

    /// Adds the number of entries removed by an invalidation.
    pub fn record_invalidations(&self, removed: u64) {
        if removed == 0 {
            return;
        }
        self.invalidations.fetch_add(removed, Ordering::Relaxed);
        metrics::record_cache_invalidations(removed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.read().elapsed()
    }

    /// Zeroes every counter and restarts the uptime clock. Cached data is untouched.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.invalidations.store(0, Ordering::Relaxed);
        *self.started_at.write() = Instant::now();
        tracing::info!("cache statistics reset");
    }

    pub async fn report(&self, cache: &CacheService) -> CacheReport {
        let counters = self.snapshot();
        let uptime = self.uptime();
        CacheReport {
            hits: counters.hits,
            misses: counters.misses,
            sets: counters.sets,
            invalidations: counters.invalidations,
            hit_ratio: format_hit_ratio(counters.hit_ratio()),
            uptime: format_uptime(uptime),
            uptime_secs: uptime.as_secs(),
            backend: cache.backend_info().await,
        }
    }

    /// Lists every live key with its TTL. O(keys); admin use only.
    pub async fn keys_info(&self, cache: &CacheService) -> Vec<KeyInfo> {
        let mut info = Vec::new();
        for key in cache.keys("*").await {
            let ttl = cache.ttl(&key).await;
            info.push(KeyInfo {
                key,
                ttl: ttl.into(),
            });
        }
        info
    }
}

pub fn format_hit_ratio(ratio: Option<f64>) -> String {
    match ratio {
        Some(r) => format!("{:.2}%", r * 100.0),
        None => NOT_APPLICABLE.to_string(),
    }
}

pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    format!("{}h {}m {}s", total / 3600, (total % 3600) / 60, total % 60)
}
