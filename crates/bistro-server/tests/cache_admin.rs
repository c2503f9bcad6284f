use std::sync::Arc;

use bistro_server::cache::{CacheMonitor, CacheService, KvBackend, MemoryBackend};
use bistro_server::{AppConfig, AppState, StorageBackend, build_app};
use bistro_storage::{MemoryStore, NewCategory, NewTable, Store};
use serde_json::{Value, json};

async fn start_server(store: Arc<MemoryStore>, cache: CacheService) -> String {
    let mut cfg = AppConfig::default();
    cfg.storage.backend = StorageBackend::Memory;
    let app = build_app(AppState::new(store, cache), &cfg);

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn memory_cache() -> CacheService {
    let backend: Arc<dyn KvBackend> = Arc::new(MemoryBackend::new());
    CacheService::new(Some(backend), Arc::new(CacheMonitor::new()))
}

async fn json_of(resp: reqwest::Response) -> Value {
    resp.json().await.unwrap()
}

#[tokio::test]
async fn stats_report_counters_and_backend() {
    let cache = memory_cache();
    let base = start_server(Arc::new(MemoryStore::new()), cache.clone()).await;
    let client = reqwest::Client::new();

    let body = json_of(client.get(format!("{base}/cache/stats")).send().await.unwrap()).await;
    assert_eq!(body["hits"], 0);
    assert_eq!(body["hit_ratio"], "N/A");
    assert_eq!(body["backend"]["available"], true);
    assert_eq!(body["backend"]["backend"], "memory");

    // One miss then one hit.
    client.get(format!("{base}/categories")).send().await.unwrap();
    client.get(format!("{base}/categories")).send().await.unwrap();

    let body = json_of(client.get(format!("{base}/cache/stats")).send().await.unwrap()).await;
    assert_eq!(body["hits"], 1);
    assert_eq!(body["misses"], 1);
    assert_eq!(body["sets"], 1);
    assert_eq!(body["hit_ratio"], "50.00%");
    assert_eq!(body["backend"]["keys"], 1);
    assert!(body["uptime"].as_str().unwrap().ends_with('s'));
}

#[tokio::test]
async fn keys_and_single_key_inspection() {
    let cache = memory_cache();
    let base = start_server(Arc::new(MemoryStore::new()), cache.clone()).await;
    let client = reqwest::Client::new();
    cache.set_with_ttl("settings:all", &json!({"tax": 7}), 600).await;

    let body = json_of(client.get(format!("{base}/cache/keys")).send().await.unwrap()).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["keys"][0]["key"], "settings:all");
    let ttl = body["keys"][0]["ttl"].as_u64().unwrap();
    assert!(ttl > 590 && ttl <= 600);

    let resp = client
        .get(format!("{base}/cache/settings:all"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = json_of(resp).await;
    assert_eq!(body["value"], json!({"tax": 7}));

    let resp = client
        .get(format!("{base}/cache/nothing:here"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(json_of(resp).await["error"], "not_found");

    // Inspection does not count as traffic.
    let counters = cache.monitor().snapshot();
    assert_eq!((counters.hits, counters.misses), (0, 0));
}

#[tokio::test]
async fn deletes_by_key_pattern_and_flush() {
    let cache = memory_cache();
    let base = start_server(Arc::new(MemoryStore::new()), cache.clone()).await;
    let client = reqwest::Client::new();
    for key in ["tables:all", "tables:detail:1", "tables:detail:2", "orders:all"] {
        cache.set(key, &json!(key)).await;
    }

    let body = json_of(
        client
            .delete(format!("{base}/cache/orders:all"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["deleted"], true);

    let body = json_of(
        client
            .delete(format!("{base}/cache/orders:all"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["deleted"], false);

    let body = json_of(
        client
            .delete(format!("{base}/cache/pattern/tables:detail:*"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["deleted"], 2);
    assert_eq!(cache.keys("*").await, vec!["tables:all".to_string()]);

    let body = json_of(
        client
            .delete(format!("{base}/cache/pattern/nomatch:*"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["deleted"], 0);

    let body = json_of(client.delete(format!("{base}/cache")).send().await.unwrap()).await;
    assert_eq!(body["flushed"], true);
    assert!(cache.keys("*").await.is_empty());
}

#[tokio::test]
async fn warm_endpoint_populates_reference_data() {
    let store = Arc::new(MemoryStore::new());
    store
        .create_category(NewCategory {
            name: "Starters".into(),
            description: None,
            sort_order: 0,
        })
        .await
        .unwrap();
    store
        .create_table(NewTable { number: 2, seats: 6 })
        .await
        .unwrap();
    let cache = memory_cache();
    let base = start_server(store, cache.clone()).await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("{base}/cache/warm")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let report = json_of(resp).await;
    assert_eq!(
        report["warmed"],
        json!(["categories:all", "tables:all", "settings:all"])
    );
    assert_eq!(report["failed"], json!([]));

    let resp = client.get(format!("{base}/categories")).send().await.unwrap();
    assert_eq!(resp.headers()["x-cache"], "HIT");
    assert_eq!(json_of(resp).await[0]["name"], "Starters");
}

#[tokio::test]
async fn admin_routes_without_cache() {
    let base = start_server(Arc::new(MemoryStore::new()), CacheService::disabled()).await;
    let client = reqwest::Client::new();

    let body = json_of(client.get(format!("{base}/cache/stats")).send().await.unwrap()).await;
    assert_eq!(body["backend"]["available"], false);

    let resp = client
        .get(format!("{base}/cache/anything"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(json_of(resp).await["error"], "not_found");

    let body = json_of(client.get(format!("{base}/cache/keys")).send().await.unwrap()).await;
    assert_eq!(body["count"], 0);

    let report = json_of(client.post(format!("{base}/cache/warm")).send().await.unwrap()).await;
    assert_eq!(report["warmed"], json!([]));
}
