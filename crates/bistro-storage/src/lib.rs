//! # bistro-storage
//!
//! System-of-record abstraction for the Bistro back office.
//!
//! The main trait is [`Store`], which covers the records the cache layer sits
//! in front of:
//! - categories and menu items
//! - dining tables
//! - orders and the kitchen queue
//! - restaurant settings
//!
//! [`MemoryStore`] is an in-process implementation for development and tests;
//! the Postgres implementation lives in `bistro-db-postgres`.

mod error;
mod memory;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError, StorageResult};
pub use memory::MemoryStore;
pub use traits::Store;
pub use types::{
    Category, DiningTable, MenuItem, NewCategory, NewMenuItem, NewOrder, NewOrderItem, NewTable,
    Order, OrderItem, OrderStatus, Settings, TableStatus, order_total,
};

/// Type alias for a shareable store instance.
pub type DynStore = std::sync::Arc<dyn Store>;
