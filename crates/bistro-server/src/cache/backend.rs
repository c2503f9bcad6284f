//! Key/value backend contract shared by every cache store.
//!
//! Backends surface every failure as a [`KvError`]. They never decide what a
//! failure means for the request; that policy lives in
//! [`CacheService`](super::service::CacheService), which turns errors into
//! misses.

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a key/value backend.
#[derive(Debug, Error)]
pub enum KvError {
    /// The request never produced a reply (connect failure, timeout, pool exhaustion).
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with an error reply.
    #[error("backend error: {0}")]
    Backend(String),

    /// The reply did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The backend is misconfigured.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for KvError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            KvError::Protocol(err.to_string())
        } else {
            KvError::Transport(err.to_string())
        }
    }
}

impl From<redis::RedisError> for KvError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_timeout() || err.is_connection_dropped() {
            KvError::Transport(err.to_string())
        } else {
            KvError::Backend(err.to_string())
        }
    }
}

impl From<deadpool_redis::PoolError> for KvError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        KvError::Transport(err.to_string())
    }
}

/// Remaining lifetime of a key, as reported by `TTL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Seconds until the key expires.
    Expires(u64),
    /// The key exists without an expiry (`-1`).
    Persistent,
    /// The key does not exist (`-2`).
    Missing,
}

impl KeyTtl {
    /// Decodes the raw Redis `TTL` reply.
    pub fn from_reply(reply: i64) -> Self {
        match reply {
            -1 => KeyTtl::Persistent,
            r if r < 0 => KeyTtl::Missing,
            r => KeyTtl::Expires(r as u64),
        }
    }

    /// Encodes back to the Redis convention.
    pub fn as_reply(&self) -> i64 {
        match self {
            KeyTtl::Expires(secs) => *secs as i64,
            KeyTtl::Persistent => -1,
            KeyTtl::Missing => -2,
        }
    }
}

/// Minimal command set the cache layer needs from a remote key/value store.
///
/// Values are opaque strings; the service layer owns JSON encoding.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Short name used in diagnostics ("upstash", "redis", "memory").
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// `SET key value EX ttl_secs`.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), KvError>;

    /// Returns the number of keys removed (0 or 1).
    async fn del(&self, key: &str) -> Result<usize, KvError>;

    /// Removes every listed key in one round trip.
    async fn del_many(&self, keys: &[String]) -> Result<usize, KvError>;

    /// Keys matching a Redis glob pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, KvError>;

    async fn exists(&self, key: &str) -> Result<bool, KvError>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl, KvError>;

    /// Resets the expiry; `false` when the key does not exist.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, KvError>;

    /// Drops the whole keyspace.
    async fn flush(&self) -> Result<(), KvError>;

    /// Number of keys in the keyspace.
    async fn dbsize(&self) -> Result<u64, KvError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_reply_decoding() {
        assert_eq!(KeyTtl::from_reply(30), KeyTtl::Expires(30));
        assert_eq!(KeyTtl::from_reply(0), KeyTtl::Expires(0));
        assert_eq!(KeyTtl::from_reply(-1), KeyTtl::Persistent);
        assert_eq!(KeyTtl::from_reply(-2), KeyTtl::Missing);
        assert_eq!(KeyTtl::Missing.as_reply(), -2);
        assert_eq!(KeyTtl::Persistent.as_reply(), -1);
    }
}
