//! Self-hosted Redis backend over a `deadpool-redis` pool.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;

use super::backend::{KeyTtl, KvBackend, KvError};

/// Keys fetched per `SCAN` round trip.
const SCAN_BATCH: usize = 200;

#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
    timeout: Duration,
}

impl RedisBackend {
    /// Builds the pool. No connection is opened until the first command.
    ///
    /// `timeout` bounds every command end to end, pool checkout included.
    pub fn connect(url: &str, pool_size: usize, timeout: Duration) -> Result<Self, KvError> {
        let mut redis_config = Config::from_url(url);
        let mut pool_config = deadpool_redis::PoolConfig::new(pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| KvError::Config(e.to_string()))?;
        Ok(Self { pool, timeout })
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, KvError> {
        Ok(self.pool.get().await?)
    }

    /// A server that accepts a command but never answers must not stall the request.
    async fn bounded<T>(
        &self,
        command: &'static str,
        fut: impl Future<Output = Result<T, KvError>>,
    ) -> Result<T, KvError> {
        tokio::time::timeout(self.timeout, fut).await.map_err(|_| {
            KvError::Transport(format!(
                "redis {command} timed out after {}ms",
                self.timeout.as_millis()
            ))
        })?
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.bounded("GET", async {
            let mut conn = self.conn().await?;
            Ok(conn.get::<_, Option<String>>(key).await?)
        })
        .await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), KvError> {
        self.bounded("SET", async {
            let mut conn = self.conn().await?;
            conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
            Ok(())
        })
        .await
    }

    async fn del(&self, key: &str) -> Result<usize, KvError> {
        self.bounded("DEL", async {
            let mut conn = self.conn().await?;
            Ok(conn.del::<_, usize>(key).await?)
        })
        .await
    }

    async fn del_many(&self, keys: &[String]) -> Result<usize, KvError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.bounded("DEL", async {
            let mut conn = self.conn().await?;
            Ok(conn.del::<_, usize>(keys).await?)
        })
        .await
    }

    /// Walks the keyspace with `SCAN MATCH` so large databases are never blocked by `KEYS`.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, KvError> {
        self.bounded("SCAN", async {
            let mut conn = self.conn().await?;
            let mut cursor: u64 = 0;
            let mut found = Vec::new();
            loop {
                let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query_async(&mut conn)
                    .await?;
                found.extend(batch);
                if next == 0 {
                    break;
                }
                cursor = next;
            }
            // SCAN may return a key more than once while the table is rehashing.
            found.sort();
            found.dedup();
            Ok(found)
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        self.bounded("EXISTS", async {
            let mut conn = self.conn().await?;
            Ok(conn.exists::<_, bool>(key).await?)
        })
        .await
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, KvError> {
        self.bounded("TTL", async {
            let mut conn = self.conn().await?;
            let reply: i64 = conn.ttl(key).await?;
            Ok(KeyTtl::from_reply(reply))
        })
        .await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, KvError> {
        // A wrapped negative TTL would make EXPIRE delete the key.
        let ttl = i64::try_from(ttl_secs)
            .map_err(|_| KvError::Protocol(format!("ttl {ttl_secs}s is out of range")))?;
        self.bounded("EXPIRE", async {
            let mut conn = self.conn().await?;
            Ok(conn.expire::<_, bool>(key, ttl).await?)
        })
        .await
    }

    async fn flush(&self) -> Result<(), KvError> {
        self.bounded("FLUSHDB", async {
            let mut conn = self.conn().await?;
            let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn dbsize(&self) -> Result<u64, KvError> {
        self.bounded("DBSIZE", async {
            let mut conn = self.conn().await?;
            let size: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;
            Ok(size)
        })
        .await
    }
}
