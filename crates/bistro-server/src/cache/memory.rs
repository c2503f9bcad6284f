//! In-process backend for local development and tests.
//!
//! Expiry is lazy: an expired entry is dropped the first time anything looks at it.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;

use super::backend::{KeyTtl, KvBackend, KvError};

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, Entry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value without expiry, mirroring a plain `SET`.
    pub fn set_persistent(&self, key: &str, value: &str) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
    }

    fn live(&self, key: &str) -> Option<Entry> {
        let now = Instant::now();
        let entry = self.entries.get(key)?.clone();
        if entry.is_expired(now) {
            self.entries.remove_if(key, |_, e| e.is_expired(now));
            return None;
        }
        Some(entry)
    }

    fn deadline(ttl_secs: u64) -> Result<Instant, KvError> {
        Instant::now()
            .checked_add(Duration::from_secs(ttl_secs))
            .ok_or_else(|| KvError::Protocol(format!("ttl {ttl_secs}s is out of range")))
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, e| !e.is_expired(now));
    }
}

/// Compiles a Redis glob (`*`, `?`, `[abc]`, `[^a-c]`, `\x`) into an anchored regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, KvError> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => out.push_str(r"\\"),
            },
            '[' => {
                let mut class = String::from("[");
                if chars.peek() == Some(&'^') {
                    chars.next();
                    class.push('^');
                }
                let mut closed = false;
                for inner in chars.by_ref() {
                    match inner {
                        ']' => {
                            closed = true;
                            break;
                        }
                        '\\' | '[' | '&' | '~' | '|' => {
                            class.push('\\');
                            class.push(inner);
                        }
                        _ => class.push(inner),
                    }
                }
                if !closed {
                    return Err(KvError::Protocol(format!(
                        "unterminated character class in pattern '{pattern}'"
                    )));
                }
                class.push(']');
                out.push_str(&class);
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|e| KvError::Protocol(format!("invalid pattern '{pattern}': {e}")))
}

#[async_trait]
impl KvBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.live(key).map(|e| e.value))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), KvError> {
        let expires_at = Self::deadline(ttl_secs)?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<usize, KvError> {
        let removed = self.live(key).is_some() && self.entries.remove(key).is_some();
        Ok(usize::from(removed))
    }

    async fn del_many(&self, keys: &[String]) -> Result<usize, KvError> {
        let mut removed = 0;
        for key in keys {
            removed += self.del(key).await?;
        }
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, KvError> {
        let matcher = glob_to_regex(pattern)?;
        self.purge_expired();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| matcher.is_match(e.key()))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        Ok(self.live(key).is_some())
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, KvError> {
        Ok(match self.live(key) {
            None => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => {
                let remaining = at.saturating_duration_since(Instant::now());
                // Redis rounds to the nearest second.
                KeyTtl::Expires((remaining.as_millis() as u64 + 500) / 1000)
            }
        })
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, KvError> {
        let expires_at = Self::deadline(ttl_secs)?;
        if self.live(key).is_none() {
            return Ok(false);
        }
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = Some(expires_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn flush(&self) -> Result<(), KvError> {
        self.entries.clear();
        Ok(())
    }

    async fn dbsize(&self) -> Result<u64, KvError> {
        self.purge_expired();
        Ok(self.entries.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_semantics_follow_redis() {
        let star = glob_to_regex("menu:*").unwrap();
        assert!(star.is_match("menu:all"));
        assert!(star.is_match("menu:category:42"));
        assert!(star.is_match("menu:"));
        assert!(!star.is_match("xmenu:all"));
        assert!(!star.is_match("categories:all"));

        let single = glob_to_regex("table?").unwrap();
        assert!(single.is_match("tables"));
        assert!(!single.is_match("table"));

        let class = glob_to_regex("h[ae]llo").unwrap();
        assert!(class.is_match("hallo"));
        assert!(class.is_match("hello"));
        assert!(!class.is_match("hillo"));

        let negated = glob_to_regex("h[^e]llo").unwrap();
        assert!(negated.is_match("hallo"));
        assert!(!negated.is_match("hello"));

        let escaped = glob_to_regex(r"literal\*").unwrap();
        assert!(escaped.is_match("literal*"));
        assert!(!escaped.is_match("literally"));

        // Regex metacharacters in keys are literal.
        let dotted = glob_to_regex("a.b").unwrap();
        assert!(dotted.is_match("a.b"));
        assert!(!dotted.is_match("axb"));
    }

    #[test]
    fn unterminated_class_is_rejected() {
        assert!(glob_to_regex("bad[").is_err());
    }

    #[tokio::test]
    async fn ttl_reports_redis_conventions() {
        let backend = MemoryBackend::new();
        backend.set_ex("a", "1", 60).await.unwrap();
        backend.set_persistent("b", "2");

        assert_eq!(backend.ttl("a").await.unwrap(), KeyTtl::Expires(60));
        assert_eq!(backend.ttl("b").await.unwrap(), KeyTtl::Persistent);
        assert_eq!(backend.ttl("c").await.unwrap(), KeyTtl::Missing);

        assert!(backend.expire("b", 10).await.unwrap());
        assert_eq!(backend.ttl("b").await.unwrap(), KeyTtl::Expires(10));
        assert!(!backend.expire("c", 10).await.unwrap());
    }

    #[tokio::test]
    async fn expired_entries_disappear() {
        let backend = MemoryBackend::new();
        backend.set_ex("short", "v", 0).await.unwrap();
        backend.set_ex("long", "v", 60).await.unwrap();

        assert_eq!(backend.get("short").await.unwrap(), None);
        assert!(!backend.exists("short").await.unwrap());
        assert_eq!(backend.keys("*").await.unwrap(), vec!["long".to_string()]);
        assert_eq!(backend.dbsize().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn oversized_ttl_is_an_error_not_a_panic() {
        let backend = MemoryBackend::new();
        let err = backend.set_ex("a", "1", u64::MAX).await.unwrap_err();
        assert!(matches!(err, KvError::Protocol(_)));
        assert!(!backend.exists("a").await.unwrap());

        backend.set_ex("b", "2", 60).await.unwrap();
        assert!(backend.expire("b", u64::MAX).await.is_err());
        assert_eq!(backend.ttl("b").await.unwrap(), KeyTtl::Expires(60));
    }

    #[tokio::test]
    async fn del_counts_only_live_keys() {
        let backend = MemoryBackend::new();
        backend.set_ex("a", "1", 60).await.unwrap();
        backend.set_ex("b", "2", 60).await.unwrap();

        let removed = backend
            .del_many(&["a".into(), "b".into(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(backend.del("a").await.unwrap(), 0);
    }
}
