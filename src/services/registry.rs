//! Order Registry
//!
//! Validated entry point for creating, cancelling and modifying advanced
//! orders. Signature verification is a precondition of PENDING: nothing
//! is persisted until the maker's signature over the canonical payload
//! recovers correctly.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::auth::{canonical_payload, verify_order_signature};
use crate::error::EngineError;
use crate::models::{
    CreateOrderRequest, ModifyOrderRequest, Order, OrderEvent, OrderStatus,
};
use crate::services::price_feed::PriceFeedService;
use crate::services::strategies::{EvalContext, StrategyRegistry};
use crate::services::watcher::WatcherScheduler;
use crate::store::OrderStore;

pub struct OrderRegistry {
    store: Arc<dyn OrderStore>,
    strategies: Arc<StrategyRegistry>,
    prices: Arc<PriceFeedService>,
    scheduler: Arc<WatcherScheduler>,
    token_symbols: HashMap<String, String>,
    staleness_ms: i64,
    default_chain_id: i64,
}

impl OrderRegistry {
    pub fn new(
        store: Arc<dyn OrderStore>,
        strategies: Arc<StrategyRegistry>,
        prices: Arc<PriceFeedService>,
        scheduler: Arc<WatcherScheduler>,
        token_symbols: HashMap<String, String>,
        staleness_ms: i64,
        default_chain_id: i64,
    ) -> Self {
        Self {
            store,
            strategies,
            prices,
            scheduler,
            token_symbols,
            staleness_ms,
            default_chain_id,
        }
    }

    fn eval_context(&self, order: &Order) -> EvalContext {
        let symbols = &self.token_symbols;
        let ticker = order
            .symbol(|addr| symbols.get(&addr.to_lowercase()).cloned())
            .and_then(|symbol| self.prices.get_price(&symbol));
        EvalContext::new(Utc::now().timestamp_millis(), ticker, self.staleness_ms)
    }

    /// Validate, persist and start watching a new order. Idempotent by
    /// signature: re-posting the same signed intent returns the existing
    /// order without side effects.
    pub async fn create(&self, req: CreateOrderRequest) -> Result<Order, EngineError> {
        if req.params.order_type() != req.order_type {
            return Err(EngineError::InvalidParams(format!(
                "params discriminator {} does not match declared type {}",
                req.params.order_type(),
                req.order_type
            )));
        }
        if req.size <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("size must be positive".into()));
        }

        let strategy = self.strategies.get(req.order_type)?;

        let payload = canonical_payload(
            req.order_type,
            req.size,
            &req.params,
            &req.maker,
            &req.maker_asset,
            &req.taker_asset,
        )?;
        verify_order_signature(&payload, &req.signature, &req.maker)?;

        if let Some(existing) = self.store.get_by_signature(&req.signature).await? {
            tracing::info!(order_id = %existing.id, "duplicate create; returning existing order");
            return Ok(existing);
        }

        let mut order = Order {
            id: Uuid::new_v4(),
            order_type: req.order_type,
            maker: req.maker.to_lowercase(),
            maker_asset: req.maker_asset.to_lowercase(),
            taker_asset: req.taker_asset.to_lowercase(),
            chain_id: req.chain_id.unwrap_or(self.default_chain_id),
            size: req.size,
            remaining_size: req.size,
            params: req.params,
            signature: req.signature,
            user_signed_payload: payload,
            status: OrderStatus::Pending,
            trigger_count: 0,
            next_trigger_value: None,
            one_inch_order_hashes: vec![],
            created_at: Utc::now(),
            executed_at: None,
            cancelled_at: None,
        };

        strategy.validate(&order)?;

        let ctx = self.eval_context(&order);
        strategy.initialize(&mut order, &ctx)?;

        self.store.save(&order).await?;
        self.store
            .append_event(&OrderEvent::transition(&order, OrderStatus::Pending))
            .await?;

        self.scheduler.start_watcher(order.id);
        crate::metrics::record_order_created();
        tracing::info!(
            order_id = %order.id,
            order_type = %order.order_type,
            maker = %order.maker,
            size = %order.size,
            "order created"
        );

        Ok(order)
    }

    pub async fn cancel(&self, id: Uuid) -> Result<Order, EngineError> {
        self.scheduler.cancel_order(id).await
    }

    /// Cancel the old order and create a replacement with a fresh id.
    /// Counters reset; no hash history is carried forward.
    pub async fn modify(&self, id: Uuid, patch: ModifyOrderRequest) -> Result<Order, EngineError> {
        let old = self.store.get(id).await?.ok_or(EngineError::NotFound(id))?;
        if old.status.is_terminal() {
            return Err(EngineError::NotFound(id));
        }

        self.scheduler.cancel_order(id).await?;

        let replacement = CreateOrderRequest {
            order_type: old.order_type,
            maker: old.maker.clone(),
            maker_asset: old.maker_asset.clone(),
            taker_asset: old.taker_asset.clone(),
            chain_id: Some(old.chain_id),
            size: patch.size.unwrap_or(old.size),
            params: patch.params.unwrap_or(old.params),
            signature: patch.signature,
        };

        let new_order = self.create(replacement).await?;
        tracing::info!(old_id = %id, new_id = %new_order.id, "order modified");
        Ok(new_order)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Order>, EngineError> {
        self.store.get(id).await
    }

    pub async fn list_by_maker(&self, maker: &str) -> Result<Vec<Order>, EngineError> {
        self.store.get_by_maker(maker).await
    }

    pub async fn list_active(&self) -> Result<Vec<Order>, EngineError> {
        self.store.get_active().await
    }

    pub async fn events(&self, order_id: Uuid) -> Result<Vec<OrderEvent>, EngineError> {
        self.store.events(order_id).await
    }
}
