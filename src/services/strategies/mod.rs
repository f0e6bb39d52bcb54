//! Trigger Strategy Family
//!
//! One strategy per advanced order type, implementing the
//! trigger/submit/complete contract the watcher scheduler drives. Strategies
//! are stateless singletons; all per-order state lives on the order record
//! (`next_trigger_value`, `trigger_count`, `remaining_size`).

mod chase_limit;
mod dca;
mod grid;
mod iceberg;
mod limit;
mod momentum_reversal;
mod range;
mod range_breakout;
mod stop_limit;
mod twap;

pub use chase_limit::ChaseLimitStrategy;
pub use dca::DcaStrategy;
pub use grid::GridTradingStrategy;
pub use iceberg::IcebergStrategy;
pub use limit::LimitStrategy;
pub use momentum_reversal::MomentumReversalStrategy;
pub use range::RangeStrategy;
pub use range_breakout::RangeBreakoutStrategy;
pub use stop_limit::StopLimitStrategy;
pub use twap::TwapStrategy;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::EngineError;
use crate::models::{AnalysisSeries, Order, OrderType, TickerSnapshot};
use crate::services::submission::SubmissionClient;

/// Maker limit prices rest 5 bps through the mid so a slice is marketable
/// without paying the full spread.
pub const MAKER_PRICE_OFFSET_BPS: i64 = 5;

pub fn offset_limit_price(mid: Decimal) -> Decimal {
    mid * (Decimal::ONE + Decimal::new(MAKER_PRICE_OFFSET_BPS, 4))
}

/// Mirror of [`offset_limit_price`] for sell-side entries
pub fn discount_limit_price(mid: Decimal) -> Decimal {
    mid * (Decimal::ONE - Decimal::new(MAKER_PRICE_OFFSET_BPS, 4))
}

/// Everything a strategy may consult during one evaluation tick
#[derive(Debug, Clone)]
pub struct EvalContext {
    pub now_ms: i64,
    pub ticker: Option<TickerSnapshot>,
    pub staleness_ms: i64,
}

impl EvalContext {
    pub fn new(now_ms: i64, ticker: Option<TickerSnapshot>, staleness_ms: i64) -> Self {
        Self {
            now_ms,
            ticker,
            staleness_ms,
        }
    }

    /// Mid price, or `None` when the sample is missing or older than the
    /// staleness threshold. Every trigger predicate gates on this.
    pub fn mid(&self) -> Option<Decimal> {
        let ticker = self.ticker.as_ref()?;
        if ticker.age_ms(self.now_ms) > self.staleness_ms {
            return None;
        }
        Some(ticker.mid)
    }

    /// Indicator series attached to a fresh sample
    pub fn analysis(&self) -> Option<&AnalysisSeries> {
        let ticker = self.ticker.as_ref()?;
        if ticker.age_ms(self.now_ms) > self.staleness_ms {
            return None;
        }
        ticker.analysis.as_ref()
    }
}

/// Result of one strategy submit. Most strategies place exactly one child;
/// GRID with a take-profit arms a second. Every hash listed here counts
/// toward `trigger_count` so `|hashes| == trigger_count` stays exact.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub order_hash: String,
    pub extra_hashes: Vec<String>,
    /// Maker-asset amount placed by this trigger (all children combined)
    pub amount: Decimal,
    pub limit_price: Decimal,
    /// Amount deducted from `remaining_size`. Equals `amount` except for
    /// re-peg strategies, whose replacement children re-place the same
    /// exposure.
    pub consumed: Decimal,
}

impl SubmitOutcome {
    pub fn single(order_hash: String, amount: Decimal, limit_price: Decimal) -> Self {
        Self {
            order_hash,
            extra_hashes: Vec::new(),
            amount,
            limit_price,
            consumed: amount,
        }
    }

    /// A replacement placement: the previous child was cancelled, so no
    /// new size is consumed.
    pub fn repeg(order_hash: String, amount: Decimal, limit_price: Decimal) -> Self {
        Self {
            order_hash,
            extra_hashes: Vec::new(),
            amount,
            limit_price,
            consumed: Decimal::ZERO,
        }
    }

    pub fn hash_count(&self) -> i32 {
        1 + self.extra_hashes.len() as i32
    }
}

#[async_trait]
pub trait Strategy: Send + Sync {
    fn order_type(&self) -> OrderType;

    /// Creation-time parameter checks; rejects the order with
    /// `InvalidParams` before anything is persisted
    fn validate(&self, order: &Order) -> Result<(), EngineError>;

    /// One-time setup after creation (seed `next_trigger_value`)
    fn initialize(&self, _order: &mut Order, _ctx: &EvalContext) -> Result<(), EngineError> {
        Ok(())
    }

    /// Trigger predicate; evaluated once per tick, false on stale data
    fn should_trigger(&self, order: &Order, ctx: &EvalContext) -> bool;

    /// Place child order(s) for this trigger
    async fn submit(
        &self,
        order: &Order,
        ctx: &EvalContext,
        client: &dyn SubmissionClient,
    ) -> Result<SubmitOutcome, EngineError>;

    /// Advance the next trigger boundary after a successful submit
    fn update_next_trigger(&self, _order: &mut Order, _ctx: &EvalContext) {}

    /// Whether the order is done after the latest submit
    fn should_complete(&self, order: &Order, ctx: &EvalContext) -> bool;

    /// Hard deadline check, evaluated before the trigger predicate
    fn is_expired(&self, _order: &Order, _now_ms: i64) -> bool {
        false
    }
}

/// `OrderType → Strategy` dispatch table
pub struct StrategyRegistry {
    strategies: HashMap<OrderType, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    /// Registry with every built-in strategy
    pub fn standard() -> Self {
        let mut registry = Self {
            strategies: HashMap::new(),
        };
        registry.register(Arc::new(StopLimitStrategy));
        registry.register(Arc::new(ChaseLimitStrategy));
        registry.register(Arc::new(TwapStrategy));
        registry.register(Arc::new(RangeStrategy));
        registry.register(Arc::new(IcebergStrategy));
        registry.register(Arc::new(DcaStrategy));
        registry.register(Arc::new(GridTradingStrategy));
        registry.register(Arc::new(MomentumReversalStrategy));
        registry.register(Arc::new(RangeBreakoutStrategy));
        registry.register(Arc::new(LimitStrategy));
        registry
    }

    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        self.strategies.insert(strategy.order_type(), strategy);
    }

    pub fn get(&self, order_type: OrderType) -> Result<Arc<dyn Strategy>, EngineError> {
        self.strategies
            .get(&order_type)
            .cloned()
            .ok_or_else(|| EngineError::UnknownOrderType(order_type.to_string()))
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
