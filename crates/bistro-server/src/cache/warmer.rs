//! Startup cache warming for near-static reference data.

use std::sync::Arc;

use bistro_storage::{StorageError, Store};
use serde::Serialize;
use serde_json::Value;

use super::policy::{self, CachePolicy};
use super::service::CacheService;

/// Outcome of one warming run.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct WarmReport {
    pub warmed: Vec<String>,
    pub failed: Vec<WarmFailure>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WarmFailure {
    pub key: String,
    pub reason: String,
}

#[derive(Clone)]
pub struct CacheWarmer {
    store: Arc<dyn Store>,
    cache: CacheService,
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Categories,
    Tables,
    Settings,
}

impl Target {
    const ALL: [Target; 3] = [Target::Categories, Target::Tables, Target::Settings];

    fn policy(self) -> CachePolicy {
        match self {
            Target::Categories => policy::CATEGORIES,
            Target::Tables => policy::TABLES,
            Target::Settings => policy::SETTINGS,
        }
    }
}

impl CacheWarmer {
    pub fn new(store: Arc<dyn Store>, cache: CacheService) -> Self {
        Self { store, cache }
    }

    /// Loads each target straight from the store and writes it under its policy key.
    ///
    /// Targets are independent: a failure is recorded and the rest still run.
    pub async fn warm(&self) -> WarmReport {
        let mut report = WarmReport::default();
        if !self.cache.is_available() {
            tracing::info!("cache unavailable, skipping warm-up");
            return report;
        }

        for target in Target::ALL {
            let policy = target.policy();
            let key = policy.read_key;
            match self.load(target).await {
                Ok(value) => {
                    if self.cache.set_with_ttl(key, &value, policy.ttl_secs).await {
                        report.warmed.push(key.to_string());
                    } else {
                        report.failed.push(WarmFailure {
                            key: key.to_string(),
                            reason: "cache write failed".into(),
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(key, error = %e, "failed to warm cache entry");
                    report.failed.push(WarmFailure {
                        key: key.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            warmed = report.warmed.len(),
            failed = report.failed.len(),
            "cache warm-up finished"
        );
        report
    }

    async fn load(&self, target: Target) -> Result<Value, StorageError> {
        let value = match target {
            Target::Categories => to_value(self.store.list_categories().await?)?,
            Target::Tables => to_value(self.store.list_tables().await?)?,
            Target::Settings => Value::Object(self.store.get_settings().await?),
        };
        Ok(value)
    }
}

fn to_value<T: Serialize>(records: T) -> Result<Value, StorageError> {
    serde_json::to_value(records).map_err(|e| StorageError::internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bistro_storage::{
        Category, DiningTable, MemoryStore, MenuItem, NewCategory, NewMenuItem, NewOrder,
        NewTable, Order, OrderStatus, Settings, StorageResult, TableStatus,
    };
    use serde_json::json;
    use uuid::Uuid;

    use crate::cache::backend::{KeyTtl, KvBackend};
    use crate::cache::memory::MemoryBackend;
    use crate::cache::monitor::CacheMonitor;

    fn memory_cache() -> CacheService {
        let backend: Arc<dyn KvBackend> = Arc::new(MemoryBackend::new());
        CacheService::new(Some(backend), Arc::new(CacheMonitor::new()))
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let mut settings = Settings::new();
        settings.insert("currency".into(), json!("EUR"));
        let store = Arc::new(MemoryStore::with_settings(settings));
        store
            .create_category(NewCategory {
                name: "Desserts".into(),
                description: None,
                sort_order: 3,
            })
            .await
            .unwrap();
        store
            .create_table(NewTable {
                number: 1,
                seats: 4,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn warms_every_target_with_its_ttl() {
        let store = seeded_store().await;
        let cache = memory_cache();
        let warmer = CacheWarmer::new(store, cache.clone());

        let report = warmer.warm().await;
        assert_eq!(
            report.warmed,
            vec!["categories:all", "tables:all", "settings:all"]
        );
        assert!(report.failed.is_empty());

        assert_eq!(cache.ttl("categories:all").await, KeyTtl::Expires(7200));
        assert_eq!(cache.ttl("tables:all").await, KeyTtl::Expires(1800));
        assert_eq!(cache.ttl("settings:all").await, KeyTtl::Expires(3600));

        let settings: Value = cache.get("settings:all").await.unwrap();
        assert_eq!(settings, json!({"currency": "EUR"}));
    }

    #[tokio::test]
    async fn warming_twice_matches_warming_once() {
        let store = seeded_store().await;
        let cache = memory_cache();
        let warmer = CacheWarmer::new(store, cache.clone());

        warmer.warm().await;
        let mut first = Vec::new();
        for key in cache.keys("*").await {
            first.push((key.clone(), cache.get::<Value>(&key).await));
        }

        let second_report = warmer.warm().await;
        assert!(second_report.failed.is_empty());
        let mut second = Vec::new();
        for key in cache.keys("*").await {
            second.push((key.clone(), cache.get::<Value>(&key).await));
        }
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    /// Store whose table listing is broken.
    struct NoTables(MemoryStore);

    #[async_trait]
    impl Store for NoTables {
        async fn list_categories(&self) -> StorageResult<Vec<Category>> {
            self.0.list_categories().await
        }
        async fn create_category(&self, input: NewCategory) -> StorageResult<Category> {
            self.0.create_category(input).await
        }
        async fn update_category(&self, id: Uuid, input: NewCategory) -> StorageResult<Category> {
            self.0.update_category(id, input).await
        }
        async fn delete_category(&self, id: Uuid) -> StorageResult<()> {
            self.0.delete_category(id).await
        }
        async fn list_menu_items(&self, category_id: Option<Uuid>) -> StorageResult<Vec<MenuItem>> {
            self.0.list_menu_items(category_id).await
        }
        async fn create_menu_item(&self, input: NewMenuItem) -> StorageResult<MenuItem> {
            self.0.create_menu_item(input).await
        }
        async fn list_tables(&self) -> StorageResult<Vec<DiningTable>> {
            Err(StorageError::connection_error("relation dining_tables is locked"))
        }
        async fn get_table(&self, id: Uuid) -> StorageResult<Option<DiningTable>> {
            self.0.get_table(id).await
        }
        async fn create_table(&self, input: NewTable) -> StorageResult<DiningTable> {
            self.0.create_table(input).await
        }
        async fn set_table_status(
            &self,
            id: Uuid,
            status: TableStatus,
        ) -> StorageResult<DiningTable> {
            self.0.set_table_status(id, status).await
        }
        async fn list_orders(&self) -> StorageResult<Vec<Order>> {
            self.0.list_orders().await
        }
        async fn create_order(&self, input: NewOrder) -> StorageResult<Order> {
            self.0.create_order(input).await
        }
        async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StorageResult<Order> {
            self.0.set_order_status(id, status).await
        }
        async fn kitchen_orders(&self) -> StorageResult<Vec<Order>> {
            self.0.kitchen_orders().await
        }
        async fn get_settings(&self) -> StorageResult<Settings> {
            self.0.get_settings().await
        }
        async fn update_settings(&self, values: Settings) -> StorageResult<Settings> {
            self.0.update_settings(values).await
        }
    }

    #[tokio::test]
    async fn one_failing_target_does_not_stop_the_others() {
        let cache = memory_cache();
        let warmer = CacheWarmer::new(Arc::new(NoTables(MemoryStore::new())), cache.clone());

        let report = warmer.warm().await;
        assert_eq!(report.warmed, vec!["categories:all", "settings:all"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].key, "tables:all");
        assert!(report.failed[0].reason.contains("locked"));
        assert!(!cache.exists("tables:all").await);
    }

    #[tokio::test]
    async fn disabled_cache_warms_nothing() {
        let store = seeded_store().await;
        let warmer = CacheWarmer::new(store.clone(), CacheService::disabled());
        assert_eq!(warmer.warm().await, WarmReport::default());
        assert_eq!(store.read_count(), 0);
    }
}
