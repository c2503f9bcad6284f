//! Categories and menu items.

use bistro_storage::{Category, MenuItem, NewCategory, NewMenuItem, StorageError, StorageResult};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::storage_err;

type CategoryRow = (Uuid, String, Option<String>, i32, OffsetDateTime);
type MenuItemRow = (Uuid, Uuid, String, i64, bool, OffsetDateTime);

fn category_from_row(row: CategoryRow) -> Category {
    let (id, name, description, sort_order, created_at) = row;
    Category {
        id,
        name,
        description,
        sort_order,
        created_at,
    }
}

fn menu_item_from_row(row: MenuItemRow) -> MenuItem {
    let (id, category_id, name, price_cents, available, created_at) = row;
    MenuItem {
        id,
        category_id,
        name,
        price_cents,
        available,
        created_at,
    }
}

pub async fn list_categories(pool: &PgPool) -> StorageResult<Vec<Category>> {
    let rows: Vec<CategoryRow> = query_as(
        "SELECT id, name, description, sort_order, created_at \
         FROM categories ORDER BY sort_order, name",
    )
    .fetch_all(pool)
    .await
    .map_err(storage_err)?;
    Ok(rows.into_iter().map(category_from_row).collect())
}

pub async fn insert_category(pool: &PgPool, input: NewCategory) -> StorageResult<Category> {
    let row: CategoryRow = query_as(
        "INSERT INTO categories (id, name, description, sort_order) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, name, description, sort_order, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.sort_order)
    .fetch_one(pool)
    .await
    .map_err(storage_err)?;
    Ok(category_from_row(row))
}

pub async fn update_category(
    pool: &PgPool,
    id: Uuid,
    input: NewCategory,
) -> StorageResult<Category> {
    let row: Option<CategoryRow> = query_as(
        "UPDATE categories SET name = $2, description = $3, sort_order = $4 \
         WHERE id = $1 \
         RETURNING id, name, description, sort_order, created_at",
    )
    .bind(id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.sort_order)
    .fetch_optional(pool)
    .await
    .map_err(storage_err)?;
    row.map(category_from_row)
        .ok_or_else(|| StorageError::not_found("category", id.to_string()))
}

pub async fn delete_category(pool: &PgPool, id: Uuid) -> StorageResult<()> {
    let result = query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(storage_err)?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("category", id.to_string()));
    }
    Ok(())
}

pub async fn list_menu_items(
    pool: &PgPool,
    category_id: Option<Uuid>,
) -> StorageResult<Vec<MenuItem>> {
    let rows: Vec<MenuItemRow> = query_as(
        "SELECT id, category_id, name, price_cents, available, created_at \
         FROM menu_items \
         WHERE ($1::uuid IS NULL OR category_id = $1) \
         ORDER BY name",
    )
    .bind(category_id)
    .fetch_all(pool)
    .await
    .map_err(storage_err)?;
    Ok(rows.into_iter().map(menu_item_from_row).collect())
}

pub async fn insert_menu_item(pool: &PgPool, input: NewMenuItem) -> StorageResult<MenuItem> {
    let exists: Option<(Uuid,)> = query_as("SELECT id FROM categories WHERE id = $1")
        .bind(input.category_id)
        .fetch_optional(pool)
        .await
        .map_err(storage_err)?;
    if exists.is_none() {
        return Err(StorageError::not_found(
            "category",
            input.category_id.to_string(),
        ));
    }

    let row: MenuItemRow = query_as(
        "INSERT INTO menu_items (id, category_id, name, price_cents, available) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, category_id, name, price_cents, available, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(input.category_id)
    .bind(&input.name)
    .bind(input.price_cents)
    .bind(input.available)
    .fetch_one(pool)
    .await
    .map_err(storage_err)?;
    Ok(menu_item_from_row(row))
}
