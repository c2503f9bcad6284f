//! Read-through cache in front of the system of record.
//!
//! ## Architecture
//!
//! ```text
//! request → read_through ─hit──────────────────────────→ response (x-cache: HIT)
//!                 │
//!                miss → handler → Store → CacheTarget::store → response (x-cache: MISS)
//!
//! write   → handler → response ──2xx──→ spawn_invalidation(patterns)
//! ```
//!
//! - [`KvBackend`]: the command set a key/value store must offer
//!   (Upstash REST, Redis, or in-process memory)
//! - [`CacheService`]: fail-soft wrapper; backend errors become misses
//! - [`CacheMonitor`]: hit/miss/set/invalidation counters
//! - [`CacheWarmer`]: pre-populates reference data at startup
//! - [`policy`]: per-resource keys, TTLs and invalidation patterns
//!
//! ## Graceful Degradation
//!
//! When no backend is configured, or the configured one is down, every read is
//! a miss and every write a no-op. Requests are always answered from the store.

pub mod backend;
pub mod memory;
pub mod monitor;
pub mod policy;
pub mod redis;
pub mod service;
pub mod upstash;
pub mod warmer;

pub use backend::{KeyTtl, KvBackend, KvError};
pub use memory::MemoryBackend;
pub use monitor::{CacheMonitor, CacheReport, KeyInfo};
pub use self::redis::RedisBackend;
pub use service::{BackendInfo, CacheService};
pub use upstash::UpstashBackend;
pub use warmer::{CacheWarmer, WarmReport};
