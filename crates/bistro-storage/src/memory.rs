//! In-process [`Store`] used for local development and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::traits::Store;
use crate::types::{
    Category, DiningTable, MenuItem, NewCategory, NewMenuItem, NewOrder, NewTable, Order,
    OrderItem, OrderStatus, Settings, TableStatus, order_total,
};

#[derive(Debug, Default)]
struct Inner {
    categories: HashMap<Uuid, Category>,
    menu_items: HashMap<Uuid, MenuItem>,
    tables: HashMap<Uuid, DiningTable>,
    orders: HashMap<Uuid, Order>,
    settings: Settings,
}

/// In-memory store guarded by a single async `RwLock`.
///
/// Every list/get call bumps a read counter, which lets tests assert whether
/// a request reached the system of record or was answered from cache.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    reads: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store preloaded with the given settings.
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(Inner {
                settings,
                ..Inner::default()
            }),
            reads: AtomicU64::new(0),
        }
    }

    /// Number of read operations served so far.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }
}

fn sorted_by<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_categories(&self) -> StorageResult<Vec<Category>> {
        self.record_read();
        let inner = self.inner.read().await;
        let categories: Vec<Category> = inner.categories.values().cloned().collect();
        Ok(sorted_by(categories, |c| (c.sort_order, c.name.clone())))
    }

    async fn create_category(&self, input: NewCategory) -> StorageResult<Category> {
        input.validate()?;
        let category = Category {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            sort_order: input.sort_order,
            created_at: OffsetDateTime::now_utc(),
        };
        let mut inner = self.inner.write().await;
        inner.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: Uuid, input: NewCategory) -> StorageResult<Category> {
        input.validate()?;
        let mut inner = self.inner.write().await;
        let category = inner
            .categories
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("category", id.to_string()))?;
        category.name = input.name;
        category.description = input.description;
        category.sort_order = input.sort_order;
        Ok(category.clone())
    }

    async fn delete_category(&self, id: Uuid) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        if inner.categories.remove(&id).is_none() {
            return Err(StorageError::not_found("category", id.to_string()));
        }
        inner.menu_items.retain(|_, item| item.category_id != id);
        Ok(())
    }

    async fn list_menu_items(&self, category_id: Option<Uuid>) -> StorageResult<Vec<MenuItem>> {
        self.record_read();
        let inner = self.inner.read().await;
        let items: Vec<MenuItem> = inner
            .menu_items
            .values()
            .filter(|item| category_id.is_none_or(|id| item.category_id == id))
            .cloned()
            .collect();
        Ok(sorted_by(items, |i| i.name.clone()))
    }

    async fn create_menu_item(&self, input: NewMenuItem) -> StorageResult<MenuItem> {
        input.validate()?;
        let mut inner = self.inner.write().await;
        if !inner.categories.contains_key(&input.category_id) {
            return Err(StorageError::not_found(
                "category",
                input.category_id.to_string(),
            ));
        }
        let item = MenuItem {
            id: Uuid::new_v4(),
            category_id: input.category_id,
            name: input.name,
            price_cents: input.price_cents,
            available: input.available,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.menu_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn list_tables(&self) -> StorageResult<Vec<DiningTable>> {
        self.record_read();
        let inner = self.inner.read().await;
        let tables: Vec<DiningTable> = inner.tables.values().cloned().collect();
        Ok(sorted_by(tables, |t| t.number))
    }

    async fn get_table(&self, id: Uuid) -> StorageResult<Option<DiningTable>> {
        self.record_read();
        let inner = self.inner.read().await;
        Ok(inner.tables.get(&id).cloned())
    }

    async fn create_table(&self, input: NewTable) -> StorageResult<DiningTable> {
        input.validate()?;
        let mut inner = self.inner.write().await;
        if inner.tables.values().any(|t| t.number == input.number) {
            return Err(StorageError::conflict(format!(
                "table number {} already exists",
                input.number
            )));
        }
        let table = DiningTable {
            id: Uuid::new_v4(),
            number: input.number,
            seats: input.seats,
            status: TableStatus::Free,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.tables.insert(table.id, table.clone());
        Ok(table)
    }

    async fn set_table_status(
        &self,
        id: Uuid,
        status: TableStatus,
    ) -> StorageResult<DiningTable> {
        let mut inner = self.inner.write().await;
        let table = inner
            .tables
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("table", id.to_string()))?;
        table.status = status;
        Ok(table.clone())
    }

    async fn list_orders(&self) -> StorageResult<Vec<Order>> {
        self.record_read();
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn create_order(&self, input: NewOrder) -> StorageResult<Order> {
        input.validate()?;
        let mut inner = self.inner.write().await;

        if let Some(table_id) = input.table_id
            && !inner.tables.contains_key(&table_id)
        {
            return Err(StorageError::not_found("table", table_id.to_string()));
        }

        let mut items = Vec::with_capacity(input.items.len());
        for line in input.items {
            let menu_item = inner
                .menu_items
                .get(&line.menu_item_id)
                .ok_or_else(|| StorageError::not_found("menu item", line.menu_item_id.to_string()))?;
            if !menu_item.available {
                return Err(StorageError::invalid_input(format!(
                    "menu item '{}' is not available",
                    menu_item.name
                )));
            }
            items.push(OrderItem {
                menu_item_id: menu_item.id,
                name: menu_item.name.clone(),
                quantity: line.quantity,
                unit_price_cents: menu_item.price_cents,
                notes: line.notes,
            });
        }

        let now = OffsetDateTime::now_utc();
        let order = Order {
            id: Uuid::new_v4(),
            table_id: input.table_id,
            status: OrderStatus::Pending,
            total_cents: order_total(&items),
            items,
            created_at: now,
            updated_at: now,
        };

        if let Some(table_id) = order.table_id
            && let Some(table) = inner.tables.get_mut(&table_id)
        {
            table.status = TableStatus::Occupied;
        }

        inner.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StorageResult<Order> {
        let mut inner = self.inner.write().await;
        let order = inner
            .orders
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("order", id.to_string()))?;
        order.status = status;
        order.updated_at = OffsetDateTime::now_utc();
        let order = order.clone();

        if status.is_closed()
            && let Some(table_id) = order.table_id
            && let Some(table) = inner.tables.get_mut(&table_id)
        {
            table.status = TableStatus::Free;
        }
        Ok(order)
    }

    async fn kitchen_orders(&self) -> StorageResult<Vec<Order>> {
        self.record_read();
        let inner = self.inner.read().await;
        let orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.status.in_kitchen())
            .cloned()
            .collect();
        Ok(sorted_by(orders, |o| o.created_at))
    }

    async fn get_settings(&self) -> StorageResult<Settings> {
        self.record_read();
        Ok(self.inner.read().await.settings.clone())
    }

    async fn update_settings(&self, values: Settings) -> StorageResult<Settings> {
        let mut inner = self.inner.write().await;
        for (key, value) in values {
            inner.settings.insert(key, value);
        }
        Ok(inner.settings.clone())
    }
}
