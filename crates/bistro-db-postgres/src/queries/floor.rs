//! Dining tables.

use bistro_storage::{DiningTable, NewTable, StorageError, StorageResult, TableStatus};
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::storage_err;

pub(crate) type TableRow = (Uuid, i32, i32, String, OffsetDateTime);

pub(crate) fn table_from_row(row: TableRow) -> StorageResult<DiningTable> {
    let (id, number, seats, status, created_at) = row;
    Ok(DiningTable {
        id,
        number,
        seats,
        status: status.parse()?,
        created_at,
    })
}

pub async fn list_tables(pool: &PgPool) -> StorageResult<Vec<DiningTable>> {
    let rows: Vec<TableRow> = query_as(
        "SELECT id, number, seats, status, created_at FROM dining_tables ORDER BY number",
    )
    .fetch_all(pool)
    .await
    .map_err(storage_err)?;
    rows.into_iter().map(table_from_row).collect()
}

pub async fn get_table(pool: &PgPool, id: Uuid) -> StorageResult<Option<DiningTable>> {
    let row: Option<TableRow> = query_as(
        "SELECT id, number, seats, status, created_at FROM dining_tables WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(storage_err)?;
    row.map(table_from_row).transpose()
}

pub async fn insert_table(pool: &PgPool, input: NewTable) -> StorageResult<DiningTable> {
    let row: TableRow = query_as(
        "INSERT INTO dining_tables (id, number, seats, status) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, number, seats, status, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(input.number)
    .bind(input.seats)
    .bind(TableStatus::Free.as_str())
    .fetch_one(pool)
    .await
    .map_err(storage_err)?;
    table_from_row(row)
}

pub async fn set_table_status(
    pool: &PgPool,
    id: Uuid,
    status: TableStatus,
) -> StorageResult<DiningTable> {
    let row: Option<TableRow> = query_as(
        "UPDATE dining_tables SET status = $2 WHERE id = $1 \
         RETURNING id, number, seats, status, created_at",
    )
    .bind(id)
    .bind(status.as_str())
    .fetch_optional(pool)
    .await
    .map_err(storage_err)?;
    row.map(table_from_row)
        .transpose()?
        .ok_or_else(|| StorageError::not_found("table", id.to_string()))
}
