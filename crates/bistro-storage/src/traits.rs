//! The system-of-record contract.
//!
//! Handlers and the cache warmer talk to the database exclusively through
//! [`Store`]. Implementations must be thread-safe (`Send + Sync`).

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StorageResult;
use crate::types::{
    Category, DiningTable, MenuItem, NewCategory, NewMenuItem, NewOrder, NewTable, Order,
    OrderStatus, Settings, TableStatus,
};

/// Storage backend for the back office.
///
/// # Example
///
/// ```ignore
/// use bistro_storage::{Store, StorageError};
///
/// async fn table_count(store: &dyn Store) -> Result<usize, StorageError> {
///     Ok(store.list_tables().await?.len())
/// }
/// ```
#[async_trait]
pub trait Store: Send + Sync {
    // ==================== Categories ====================

    /// Lists all categories ordered by `sort_order`, then name.
    async fn list_categories(&self) -> StorageResult<Vec<Category>>;

    /// Creates a category.
    async fn create_category(&self, input: NewCategory) -> StorageResult<Category>;

    /// Replaces a category's fields.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the category does not exist.
    async fn update_category(&self, id: Uuid, input: NewCategory) -> StorageResult<Category>;

    /// Deletes a category and its menu items.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the category does not exist.
    async fn delete_category(&self, id: Uuid) -> StorageResult<()>;

    // ==================== Menu ====================

    /// Lists menu items, optionally restricted to one category.
    async fn list_menu_items(&self, category_id: Option<Uuid>) -> StorageResult<Vec<MenuItem>>;

    /// Creates a menu item.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the category does not exist.
    async fn create_menu_item(&self, input: NewMenuItem) -> StorageResult<MenuItem>;

    // ==================== Tables ====================

    /// Lists all dining tables ordered by number.
    async fn list_tables(&self) -> StorageResult<Vec<DiningTable>>;

    /// Reads a single table. Returns `None` if it does not exist.
    async fn get_table(&self, id: Uuid) -> StorageResult<Option<DiningTable>>;

    /// Creates a table in the `free` state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the table number is taken.
    async fn create_table(&self, input: NewTable) -> StorageResult<DiningTable>;

    /// Sets a table's occupancy status.
    async fn set_table_status(&self, id: Uuid, status: TableStatus)
    -> StorageResult<DiningTable>;

    // ==================== Orders ====================

    /// Lists all orders, newest first.
    async fn list_orders(&self) -> StorageResult<Vec<Order>>;

    /// Places an order. Prices come from the menu; the table, if any, becomes occupied.
    async fn create_order(&self, input: NewOrder) -> StorageResult<Order>;

    /// Moves an order to a new status. Closing an order frees its table.
    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StorageResult<Order>;

    /// Orders waiting on the kitchen (pending or preparing), oldest first.
    async fn kitchen_orders(&self) -> StorageResult<Vec<Order>>;

    // ==================== Settings ====================

    /// Reads all settings.
    async fn get_settings(&self) -> StorageResult<Settings>;

    /// Merges the given values into the settings and returns the result.
    async fn update_settings(&self, values: Settings) -> StorageResult<Settings>;
}
