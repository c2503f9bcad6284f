//! Schema management for the PostgreSQL store.
//!
//! The back office uses a small fixed schema. Every statement is idempotent,
//! so `ensure_schema` is safe to run on every startup.

use sqlx_postgres::PgPool;
use tracing::{debug, info, instrument};

use crate::error::Result;

/// DDL statements, executed in order.
const SCHEMA_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS categories (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        sort_order INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS menu_items (
        id UUID PRIMARY KEY,
        category_id UUID NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        price_cents BIGINT NOT NULL CHECK (price_cents >= 0),
        available BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    "CREATE INDEX IF NOT EXISTS menu_items_category_idx ON menu_items (category_id)",
    r#"CREATE TABLE IF NOT EXISTS dining_tables (
        id UUID PRIMARY KEY,
        number INTEGER NOT NULL UNIQUE,
        seats INTEGER NOT NULL CHECK (seats > 0),
        status TEXT NOT NULL DEFAULT 'free',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS orders (
        id UUID PRIMARY KEY,
        table_id UUID REFERENCES dining_tables(id) ON DELETE SET NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        items JSONB NOT NULL DEFAULT '[]'::jsonb,
        total_cents BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    "CREATE INDEX IF NOT EXISTS orders_status_idx ON orders (status)",
    r#"CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value JSONB NOT NULL
    )"#,
];

/// Creates any missing tables and indexes.
#[instrument(skip(pool))]
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        sqlx_core::query::query(statement).execute(pool).await?;
    }
    debug!(statements = SCHEMA_STATEMENTS.len(), "schema statements applied");
    info!("Database schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_statement_is_idempotent() {
        for statement in SCHEMA_STATEMENTS {
            assert!(
                statement.contains("IF NOT EXISTS"),
                "statement must be re-runnable: {statement}"
            );
        }
    }
}
