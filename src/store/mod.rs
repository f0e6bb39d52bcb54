//! Persistent Order Store
//!
//! Durable record of every order and its event history. The scheduler is
//! the sole writer per order at runtime; writes are atomic per record
//! (last-writer-wins). The store also hosts the TTL-keyed auxiliary
//! caches for aggregated tickers and token decimals.

pub mod memory;
pub mod postgres;

pub use memory::MemoryOrderStore;
pub use postgres::PgOrderStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{Order, OrderEvent, TickerSnapshot};

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Upsert the full order record
    async fn save(&self, order: &Order) -> Result<(), EngineError>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>, EngineError>;

    /// Parent order owning a submitted child-order hash
    async fn get_by_hash(&self, hash: &str) -> Result<Option<Order>, EngineError>;

    /// Orders whose status is PENDING, ACTIVE or PARTIALLY_FILLED,
    /// creation time descending
    async fn get_active(&self) -> Result<Vec<Order>, EngineError>;

    /// Orders still waiting for their first trigger
    async fn get_pending(&self) -> Result<Vec<Order>, EngineError>;

    async fn get_by_maker(&self, maker: &str) -> Result<Vec<Order>, EngineError>;

    /// Create-idempotency lookup: same signed intent, same order
    async fn get_by_signature(&self, signature: &str) -> Result<Option<Order>, EngineError>;

    /// Append an audit event; insertion order per order id is preserved
    async fn append_event(&self, event: &OrderEvent) -> Result<(), EngineError>;

    async fn events(&self, order_id: Uuid) -> Result<Vec<OrderEvent>, EngineError>;

    // TTL-keyed auxiliary caches; may be rebuilt at any time

    async fn cache_ticker(&self, snapshot: &TickerSnapshot) -> Result<(), EngineError>;

    async fn cached_ticker(
        &self,
        symbol: &str,
        max_age_ms: i64,
    ) -> Result<Option<TickerSnapshot>, EngineError>;

    async fn cache_token_decimals(
        &self,
        chain_id: i64,
        token: &str,
        decimals: u32,
    ) -> Result<(), EngineError>;

    async fn cached_token_decimals(
        &self,
        chain_id: i64,
        token: &str,
        max_age_ms: i64,
    ) -> Result<Option<u32>, EngineError>;
}
