//! Database Module
//!
//! Postgres pool management and idempotent schema bootstrap for the two
//! logical tables (`orders`, `order_events`) and the TTL-keyed auxiliary
//! caches (`market_data`, `token_decimals`).

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    /// Connect and bootstrap the schema
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await?;

        run_migrations(&pool).await?;

        Ok(Self { pool })
    }
}

/// Idempotent schema creation. Safe to run on every startup; auxiliary
/// caches may be dropped and rebuilt at any time.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id UUID PRIMARY KEY,
            order_type TEXT NOT NULL,
            maker TEXT NOT NULL,
            maker_asset TEXT NOT NULL,
            taker_asset TEXT NOT NULL,
            chain_id BIGINT NOT NULL,
            size NUMERIC NOT NULL,
            remaining_size NUMERIC NOT NULL,
            params JSONB NOT NULL,
            signature TEXT NOT NULL,
            user_signed_payload TEXT NOT NULL,
            status TEXT NOT NULL,
            trigger_count INTEGER NOT NULL DEFAULT 0,
            next_trigger_value NUMERIC,
            one_inch_order_hashes JSONB NOT NULL DEFAULT '[]'::jsonb,
            created_at TIMESTAMPTZ NOT NULL,
            executed_at TIMESTAMPTZ,
            cancelled_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_status ON orders (status)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_orders_status_created ON orders (status, created_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_maker ON orders (maker)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_orders_hashes ON orders USING GIN (one_inch_order_hashes)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_signature ON orders (signature)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS order_events (
            id BIGSERIAL PRIMARY KEY,
            order_id UUID NOT NULL,
            order_hash TEXT,
            status TEXT NOT NULL,
            timestamp TIMESTAMPTZ NOT NULL,
            filled_amount NUMERIC,
            tx_hash TEXT,
            error TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_order_events_order ON order_events (order_id, id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS market_data (
            symbol TEXT PRIMARY KEY,
            payload JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS token_decimals (
            chain_id BIGINT NOT NULL,
            token TEXT NOT NULL,
            decimals INTEGER NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (chain_id, token)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
