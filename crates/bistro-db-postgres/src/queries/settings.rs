//! Key/value restaurant settings.

use bistro_storage::{Settings, StorageResult};
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;

use crate::error::storage_err;

pub async fn get_settings(pool: &PgPool) -> StorageResult<Settings> {
    let rows: Vec<(String, Value)> = query_as("SELECT key, value FROM settings ORDER BY key")
        .fetch_all(pool)
        .await
        .map_err(storage_err)?;
    Ok(rows.into_iter().collect())
}

pub async fn upsert_settings(pool: &PgPool, values: Settings) -> StorageResult<Settings> {
    let mut tx = pool.begin().await.map_err(storage_err)?;
    for (key, value) in values {
        query(
            "INSERT INTO settings (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
    }
    tx.commit().await.map_err(storage_err)?;
    get_settings(pool).await
}
