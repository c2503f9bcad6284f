//! PostgreSQL implementation of the `Store` trait.

use async_trait::async_trait;
use sqlx_postgres::PgPool;
use uuid::Uuid;

use bistro_storage::{
    Category, DiningTable, MenuItem, NewCategory, NewMenuItem, NewOrder, NewTable, Order,
    OrderStatus, Settings, StorageError, StorageResult, Store, TableStatus,
};

use crate::config::PostgresConfig;
use crate::pool;
use crate::queries::{catalog, floor, orders, settings};
use crate::schema;

/// PostgreSQL system of record (Supabase-compatible).
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new `PostgresStore` with the given configuration.
    ///
    /// This will:
    /// 1. Create a connection pool
    /// 2. Create missing tables (if configured)
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created
    /// or if schema creation fails.
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::create_pool(&config).await?;

        if config.ensure_schema {
            schema::ensure_schema(&pool).await?;
        }

        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn list_categories(&self) -> StorageResult<Vec<Category>> {
        catalog::list_categories(&self.pool).await
    }

    async fn create_category(&self, input: NewCategory) -> StorageResult<Category> {
        input.validate()?;
        catalog::insert_category(&self.pool, input).await
    }

    async fn update_category(&self, id: Uuid, input: NewCategory) -> StorageResult<Category> {
        input.validate()?;
        catalog::update_category(&self.pool, id, input).await
    }

    async fn delete_category(&self, id: Uuid) -> StorageResult<()> {
        catalog::delete_category(&self.pool, id).await
    }

    async fn list_menu_items(&self, category_id: Option<Uuid>) -> StorageResult<Vec<MenuItem>> {
        catalog::list_menu_items(&self.pool, category_id).await
    }

    async fn create_menu_item(&self, input: NewMenuItem) -> StorageResult<MenuItem> {
        input.validate()?;
        catalog::insert_menu_item(&self.pool, input).await
    }

    async fn list_tables(&self) -> StorageResult<Vec<DiningTable>> {
        floor::list_tables(&self.pool).await
    }

    async fn get_table(&self, id: Uuid) -> StorageResult<Option<DiningTable>> {
        floor::get_table(&self.pool, id).await
    }

    async fn create_table(&self, input: NewTable) -> StorageResult<DiningTable> {
        input.validate()?;
        floor::insert_table(&self.pool, input).await
    }

    async fn set_table_status(
        &self,
        id: Uuid,
        status: TableStatus,
    ) -> StorageResult<DiningTable> {
        floor::set_table_status(&self.pool, id, status).await
    }

    async fn list_orders(&self) -> StorageResult<Vec<Order>> {
        orders::list_orders(&self.pool).await
    }

    async fn create_order(&self, input: NewOrder) -> StorageResult<Order> {
        input.validate()?;
        orders::insert_order(&self.pool, input).await
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StorageResult<Order> {
        orders::set_order_status(&self.pool, id, status).await
    }

    async fn kitchen_orders(&self) -> StorageResult<Vec<Order>> {
        orders::kitchen_orders(&self.pool).await
    }

    async fn get_settings(&self) -> StorageResult<Settings> {
        settings::get_settings(&self.pool).await
    }

    async fn update_settings(&self, values: Settings) -> StorageResult<Settings> {
        settings::upsert_settings(&self.pool, values).await
    }
}
