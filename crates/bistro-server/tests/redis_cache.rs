//! Integration tests for the self-hosted Redis backend.
//!
//! Most tests use testcontainers to spin up a real Redis instance, so they need
//! a Docker daemon and are ignored by default:
//! `cargo test -p bistro-server --test redis_cache -- --ignored`
//!
//! The stalled-server test runs against an in-process RESP listener instead.

use std::sync::Arc;
use std::time::Duration;

use bistro_server::cache::{CacheMonitor, CacheService, KeyTtl, KvBackend, KvError, RedisBackend};
use bistro_server::{CacheBackendKind, CacheConfig, RedisConfig, create_kv_backend};
use serde_json::json;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::OnceCell;

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

/// Get or create the shared Redis container
async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (container, url)
        })
        .await;

    url.clone()
}

fn backend(url: &str) -> RedisBackend {
    RedisBackend::connect(url, 4, Duration::from_secs(5)).expect("pool")
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_round_trip_and_ttl() {
    let kv = backend(&get_redis_url().await);

    kv.set_ex("rt:settings:all", r#"{"currency":"EUR"}"#, 60)
        .await
        .unwrap();
    assert_eq!(
        kv.get("rt:settings:all").await.unwrap().as_deref(),
        Some(r#"{"currency":"EUR"}"#)
    );
    match kv.ttl("rt:settings:all").await.unwrap() {
        KeyTtl::Expires(secs) => assert!(secs > 0 && secs <= 60),
        other => panic!("unexpected ttl {other:?}"),
    }
    assert_eq!(kv.ttl("rt:missing").await.unwrap(), KeyTtl::Missing);
    assert!(kv.exists("rt:settings:all").await.unwrap());
    assert_eq!(kv.del("rt:settings:all").await.unwrap(), 1);
    assert_eq!(kv.del("rt:settings:all").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_pattern_invalidation_through_service() {
    let kv: Arc<dyn KvBackend> = Arc::new(backend(&get_redis_url().await));
    let cache = CacheService::new(Some(kv), Arc::new(CacheMonitor::new()));

    for key in ["pi:tables:all", "pi:tables:detail:1", "pi:tables:detail:2", "pi:orders:all"] {
        assert!(cache.set(key, &json!(key)).await);
    }

    assert_eq!(cache.invalidate_pattern("pi:tables:*").await, 3);
    assert_eq!(cache.invalidate_pattern("pi:tables:*").await, 0);
    assert_eq!(cache.keys("pi:*").await, vec!["pi:orders:all".to_string()]);
    assert_eq!(cache.monitor().snapshot().invalidations, 3);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_expiry() {
    let kv: Arc<dyn KvBackend> = Arc::new(backend(&get_redis_url().await));
    let cache = CacheService::new(Some(kv), Arc::new(CacheMonitor::new()));

    assert!(cache.set_with_ttl("ex:short", &json!({"v": 1}), 1).await);
    assert_eq!(cache.get::<serde_json::Value>("ex:short").await, Some(json!({"v": 1})));
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(cache.get::<serde_json::Value>("ex:short").await, None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_create_kv_backend_for_redis() {
    let config = CacheConfig {
        backend: CacheBackendKind::Redis,
        redis: RedisConfig {
            url: Some(get_redis_url().await),
            pool_size: 5,
            timeout_ms: 5000,
        },
        ..CacheConfig::default()
    };

    let kv = create_kv_backend(&config).await.expect("redis backend");
    assert_eq!(kv.name(), "redis");
    kv.dbsize().await.expect("dbsize");
}

/// Parses one complete RESP command array from the front of `buf`, returning
/// the command name in upper case and the number of bytes it spans.
fn parse_command(buf: &[u8]) -> Option<(String, usize)> {
    fn line(buf: &[u8], at: usize) -> Option<(&[u8], usize)> {
        let end = buf.get(at..)?.windows(2).position(|w| w == b"\r\n")? + at;
        Some((&buf[at..end], end + 2))
    }
    fn number(raw: &[u8], prefix: &[u8]) -> Option<usize> {
        std::str::from_utf8(raw.strip_prefix(prefix)?).ok()?.parse().ok()
    }

    let (header, mut at) = line(buf, 0)?;
    let argc = number(header, b"*")?;
    let mut name = String::new();
    for i in 0..argc {
        let (len_line, next) = line(buf, at)?;
        let len = number(len_line, b"$")?;
        if buf.len() < next + len + 2 {
            return None;
        }
        if i == 0 {
            name = String::from_utf8_lossy(&buf[next..next + len]).to_ascii_uppercase();
        }
        at = next + len + 2;
    }
    Some((name, at))
}

/// A server that completes the connection handshake and answers `PING`, but
/// never replies to `GET`.
async fn spawn_stalling_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    buf.extend_from_slice(&chunk[..n]);
                    while let Some((name, consumed)) = parse_command(&buf) {
                        buf.drain(..consumed);
                        let reply: &[u8] = match name.as_str() {
                            "GET" => continue,
                            "PING" => b"+PONG\r\n",
                            _ => b"+OK\r\n",
                        };
                        if socket.write_all(reply).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });
    format!("redis://{addr}")
}

#[tokio::test]
async fn test_stalled_command_times_out_as_transport_error() {
    let url = spawn_stalling_server().await;
    let kv = RedisBackend::connect(&url, 2, Duration::from_millis(500)).expect("pool");

    let err = tokio::time::timeout(Duration::from_secs(5), kv.get("categories:all"))
        .await
        .expect("backend get must respect its own timeout")
        .expect_err("stalled GET cannot succeed");
    assert!(matches!(err, KvError::Transport(_)), "unexpected error {err:?}");

    let cache = CacheService::new(Some(Arc::new(kv)), Arc::new(CacheMonitor::new()));
    let value = tokio::time::timeout(
        Duration::from_secs(5),
        cache.get::<serde_json::Value>("categories:all"),
    )
    .await
    .expect("cache get must not hang on a stalled backend");
    assert_eq!(value, None);
    assert_eq!(cache.monitor().snapshot().misses, 1);
}
