//! Postgres Order Store
//!
//! Durable implementation over the `orders` / `order_events` tables plus
//! the `market_data` and `token_decimals` caches.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::OrderStore;
use crate::error::EngineError;
use crate::models::{Order, OrderEvent, TickerSnapshot};

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn save(&self, order: &Order) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_type, maker, maker_asset, taker_asset, chain_id,
                size, remaining_size, params, signature, user_signed_payload,
                status, trigger_count, next_trigger_value, one_inch_order_hashes,
                created_at, executed_at, cancelled_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (id) DO UPDATE SET
                size = EXCLUDED.size,
                remaining_size = EXCLUDED.remaining_size,
                params = EXCLUDED.params,
                status = EXCLUDED.status,
                trigger_count = EXCLUDED.trigger_count,
                next_trigger_value = EXCLUDED.next_trigger_value,
                one_inch_order_hashes = EXCLUDED.one_inch_order_hashes,
                executed_at = EXCLUDED.executed_at,
                cancelled_at = EXCLUDED.cancelled_at
            "#,
        )
        .bind(order.id)
        .bind(order.order_type)
        .bind(&order.maker)
        .bind(&order.maker_asset)
        .bind(&order.taker_asset)
        .bind(order.chain_id)
        .bind(order.size)
        .bind(order.remaining_size)
        .bind(Json(&order.params))
        .bind(&order.signature)
        .bind(&order.user_signed_payload)
        .bind(order.status)
        .bind(order.trigger_count)
        .bind(order.next_trigger_value)
        .bind(Json(&order.one_inch_order_hashes))
        .bind(order.created_at)
        .bind(order.executed_at)
        .bind(order.cancelled_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, EngineError> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    async fn get_by_hash(&self, hash: &str) -> Result<Option<Order>, EngineError> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE one_inch_order_hashes @> $1::jsonb LIMIT 1",
        )
        .bind(serde_json::json!([hash]))
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    async fn get_active(&self) -> Result<Vec<Order>, EngineError> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE status IN ('pending', 'active', 'partially_filled')
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    async fn get_pending(&self) -> Result<Vec<Order>, EngineError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE status = 'pending' ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    async fn get_by_maker(&self, maker: &str) -> Result<Vec<Order>, EngineError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE maker = $1 ORDER BY created_at DESC",
        )
        .bind(maker.to_lowercase())
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    async fn get_by_signature(&self, signature: &str) -> Result<Option<Order>, EngineError> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE signature = $1")
            .bind(signature)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    async fn append_event(&self, event: &OrderEvent) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO order_events
                (order_id, order_hash, status, timestamp, filled_amount, tx_hash, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.order_id)
        .bind(&event.order_hash)
        .bind(event.status)
        .bind(event.timestamp)
        .bind(event.filled_amount)
        .bind(&event.tx_hash)
        .bind(&event.error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn events(&self, order_id: Uuid) -> Result<Vec<OrderEvent>, EngineError> {
        let events = sqlx::query_as::<_, OrderEvent>(
            "SELECT * FROM order_events WHERE order_id = $1 ORDER BY id ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn cache_ticker(&self, snapshot: &TickerSnapshot) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO market_data (symbol, payload, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (symbol) DO UPDATE SET
                payload = EXCLUDED.payload,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&snapshot.symbol)
        .bind(Json(snapshot))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn cached_ticker(
        &self,
        symbol: &str,
        max_age_ms: i64,
    ) -> Result<Option<TickerSnapshot>, EngineError> {
        let row: Option<(Json<TickerSnapshot>,)> = sqlx::query_as(
            r#"
            SELECT payload FROM market_data
            WHERE symbol = $1
              AND updated_at > NOW() - make_interval(secs => $2::float8 / 1000.0)
            "#,
        )
        .bind(symbol)
        .bind(max_age_ms)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(Json(snapshot),)| snapshot))
    }

    async fn cache_token_decimals(
        &self,
        chain_id: i64,
        token: &str,
        decimals: u32,
    ) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO token_decimals (chain_id, token, decimals, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (chain_id, token) DO UPDATE SET
                decimals = EXCLUDED.decimals,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(chain_id)
        .bind(token.to_lowercase())
        .bind(decimals as i32)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn cached_token_decimals(
        &self,
        chain_id: i64,
        token: &str,
        max_age_ms: i64,
    ) -> Result<Option<u32>, EngineError> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            SELECT decimals FROM token_decimals
            WHERE chain_id = $1 AND token = $2
              AND updated_at > NOW() - make_interval(secs => $3::float8 / 1000.0)
            "#,
        )
        .bind(chain_id)
        .bind(token.to_lowercase())
        .bind(max_age_ms)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(d,)| d as u32))
    }
}
