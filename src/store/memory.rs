//! In-Memory Order Store
//!
//! Non-durable implementation used by tests and local development. Mirrors
//! the ordering and filtering guarantees of the Postgres store.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::OrderStore;
use crate::error::EngineError;
use crate::models::{Order, OrderEvent, OrderStatus, TickerSnapshot};

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: DashMap<Uuid, Order>,
    events: Mutex<Vec<OrderEvent>>,
    event_seq: AtomicI64,
    tickers: DashMap<String, (TickerSnapshot, i64)>,
    decimals: DashMap<(i64, String), (u32, i64)>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_desc(&self, mut orders: Vec<Order>) -> Vec<Order> {
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn save(&self, order: &Order) -> Result<(), EngineError> {
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, EngineError> {
        Ok(self.orders.get(&id).map(|o| o.clone()))
    }

    async fn get_by_hash(&self, hash: &str) -> Result<Option<Order>, EngineError> {
        Ok(self
            .orders
            .iter()
            .find(|o| o.one_inch_order_hashes.iter().any(|h| h == hash))
            .map(|o| o.clone()))
    }

    async fn get_active(&self) -> Result<Vec<Order>, EngineError> {
        let orders = self
            .orders
            .iter()
            .filter(|o| o.status.is_watchable())
            .map(|o| o.clone())
            .collect();
        Ok(self.sorted_desc(orders))
    }

    async fn get_pending(&self) -> Result<Vec<Order>, EngineError> {
        let orders = self
            .orders
            .iter()
            .filter(|o| o.status == OrderStatus::Pending)
            .map(|o| o.clone())
            .collect();
        Ok(self.sorted_desc(orders))
    }

    async fn get_by_maker(&self, maker: &str) -> Result<Vec<Order>, EngineError> {
        let maker = maker.to_lowercase();
        let orders = self
            .orders
            .iter()
            .filter(|o| o.maker == maker)
            .map(|o| o.clone())
            .collect();
        Ok(self.sorted_desc(orders))
    }

    async fn get_by_signature(&self, signature: &str) -> Result<Option<Order>, EngineError> {
        Ok(self
            .orders
            .iter()
            .find(|o| o.signature == signature)
            .map(|o| o.clone()))
    }

    async fn append_event(&self, event: &OrderEvent) -> Result<(), EngineError> {
        let mut event = event.clone();
        event.id = self.event_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.lock().await.push(event);
        Ok(())
    }

    async fn events(&self, order_id: Uuid) -> Result<Vec<OrderEvent>, EngineError> {
        Ok(self
            .events
            .lock()
            .await
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn cache_ticker(&self, snapshot: &TickerSnapshot) -> Result<(), EngineError> {
        self.tickers.insert(
            snapshot.symbol.clone(),
            (snapshot.clone(), Utc::now().timestamp_millis()),
        );
        Ok(())
    }

    async fn cached_ticker(
        &self,
        symbol: &str,
        max_age_ms: i64,
    ) -> Result<Option<TickerSnapshot>, EngineError> {
        let now = Utc::now().timestamp_millis();
        Ok(self.tickers.get(symbol).and_then(|entry| {
            let (snapshot, stored_at) = entry.value();
            if now - stored_at <= max_age_ms {
                Some(snapshot.clone())
            } else {
                None
            }
        }))
    }

    async fn cache_token_decimals(
        &self,
        chain_id: i64,
        token: &str,
        decimals: u32,
    ) -> Result<(), EngineError> {
        self.decimals.insert(
            (chain_id, token.to_lowercase()),
            (decimals, Utc::now().timestamp_millis()),
        );
        Ok(())
    }

    async fn cached_token_decimals(
        &self,
        chain_id: i64,
        token: &str,
        max_age_ms: i64,
    ) -> Result<Option<u32>, EngineError> {
        let now = Utc::now().timestamp_millis();
        Ok(self
            .decimals
            .get(&(chain_id, token.to_lowercase()))
            .and_then(|entry| {
                let (decimals, stored_at) = entry.value();
                if now - stored_at <= max_age_ms {
                    Some(*decimals)
                } else {
                    None
                }
            }))
    }
}
