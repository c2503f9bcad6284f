//! Orders and the kitchen queue.

use bistro_storage::{
    NewOrder, Order, OrderItem, OrderStatus, StorageError, StorageResult, TableStatus,
    order_total,
};
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{PostgresError, storage_err};

type OrderRow = (
    Uuid,
    Option<Uuid>,
    String,
    Value,
    i64,
    OffsetDateTime,
    OffsetDateTime,
);

const ORDER_COLUMNS: &str = "id, table_id, status, items, total_cents, created_at, updated_at";

fn order_from_row(row: OrderRow) -> StorageResult<Order> {
    let (id, table_id, status, items, total_cents, created_at, updated_at) = row;
    let items: Vec<OrderItem> = serde_json::from_value(items)
        .map_err(|e| StorageError::from(PostgresError::decode(format!("order items: {e}"))))?;
    Ok(Order {
        id,
        table_id,
        status: status.parse()?,
        items,
        total_cents,
        created_at,
        updated_at,
    })
}

pub async fn list_orders(pool: &PgPool) -> StorageResult<Vec<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC");
    let rows: Vec<OrderRow> = query_as(&sql)
        .fetch_all(pool)
        .await
        .map_err(storage_err)?;
    rows.into_iter().map(order_from_row).collect()
}

pub async fn kitchen_orders(pool: &PgPool) -> StorageResult<Vec<Order>> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE status IN ('pending', 'preparing') ORDER BY created_at ASC"
    );
    let rows: Vec<OrderRow> = query_as(&sql)
        .fetch_all(pool)
        .await
        .map_err(storage_err)?;
    rows.into_iter().map(order_from_row).collect()
}

/// Prices the order from the menu, inserts it and occupies its table in one transaction.
pub async fn insert_order(pool: &PgPool, input: NewOrder) -> StorageResult<Order> {
    let mut tx = pool.begin().await.map_err(storage_err)?;

    if let Some(table_id) = input.table_id {
        let table: Option<(Uuid,)> =
            query_as("SELECT id FROM dining_tables WHERE id = $1 FOR UPDATE")
                .bind(table_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage_err)?;
        if table.is_none() {
            return Err(StorageError::not_found("table", table_id.to_string()));
        }
    }

    let mut items = Vec::with_capacity(input.items.len());
    for line in input.items {
        let menu_item: Option<(Uuid, String, i64, bool)> = query_as(
            "SELECT id, name, price_cents, available FROM menu_items WHERE id = $1",
        )
        .bind(line.menu_item_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_err)?;
        let (menu_item_id, name, unit_price_cents, available) = menu_item.ok_or_else(|| {
            StorageError::not_found("menu item", line.menu_item_id.to_string())
        })?;
        if !available {
            return Err(StorageError::invalid_input(format!(
                "menu item '{name}' is not available"
            )));
        }
        items.push(OrderItem {
            menu_item_id,
            name,
            quantity: line.quantity,
            unit_price_cents,
            notes: line.notes,
        });
    }

    let total_cents = order_total(&items);
    let items_json = serde_json::to_value(&items)
        .map_err(|e| StorageError::internal(format!("serialize order items: {e}")))?;

    let sql = format!(
        "INSERT INTO orders (id, table_id, status, items, total_cents) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {ORDER_COLUMNS}"
    );
    let row: OrderRow = query_as(&sql)
        .bind(Uuid::new_v4())
        .bind(input.table_id)
        .bind(OrderStatus::Pending.as_str())
        .bind(items_json)
        .bind(total_cents)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_err)?;

    if let Some(table_id) = input.table_id {
        query("UPDATE dining_tables SET status = $2 WHERE id = $1")
            .bind(table_id)
            .bind(TableStatus::Occupied.as_str())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
    }

    tx.commit().await.map_err(storage_err)?;
    order_from_row(row)
}

/// Updates the status; closing an order frees its table.
pub async fn set_order_status(
    pool: &PgPool,
    id: Uuid,
    status: OrderStatus,
) -> StorageResult<Order> {
    let mut tx = pool.begin().await.map_err(storage_err)?;

    let sql = format!(
        "UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
    );
    let row: Option<OrderRow> = query_as(&sql)
        .bind(id)
        .bind(status.as_str())
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_err)?;
    let order = order_from_row(row.ok_or_else(|| StorageError::not_found("order", id.to_string()))?)?;

    if status.is_closed()
        && let Some(table_id) = order.table_id
    {
        query("UPDATE dining_tables SET status = $2 WHERE id = $1")
            .bind(table_id)
            .bind(TableStatus::Free.as_str())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
    }

    tx.commit().await.map_err(storage_err)?;
    Ok(order)
}
