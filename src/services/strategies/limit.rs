//! Plain Limit Strategy
//!
//! Degenerate pass-through: the first fresh tick submits the full size at
//! `limit_price` and the order completes.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{EvalContext, Strategy, SubmitOutcome};
use crate::error::EngineError;
use crate::models::{LimitParams, Order, OrderParams, OrderType};
use crate::services::submission::SubmissionClient;

pub struct LimitStrategy;

impl LimitStrategy {
    fn params(order: &Order) -> Option<&LimitParams> {
        match &order.params {
            OrderParams::Limit(p) => Some(p),
            _ => None,
        }
    }
}

#[async_trait]
impl Strategy for LimitStrategy {
    fn order_type(&self) -> OrderType {
        OrderType::Limit
    }

    fn validate(&self, order: &Order) -> Result<(), EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected limit params".into()))?;
        if p.limit_price <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("limitPrice must be positive".into()));
        }
        if let Some(expiry) = p.expiry_days {
            if expiry <= Decimal::ZERO {
                return Err(EngineError::InvalidParams("expiry must be positive".into()));
            }
        }
        Ok(())
    }

    fn should_trigger(&self, order: &Order, ctx: &EvalContext) -> bool {
        order.trigger_count == 0 && ctx.mid().is_some()
    }

    async fn submit(
        &self,
        order: &Order,
        _ctx: &EvalContext,
        client: &dyn SubmissionClient,
    ) -> Result<SubmitOutcome, EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected limit params".into()))?;
        let amount = order.remaining_size;
        let hash = client.submit(order, amount, p.limit_price).await?;
        Ok(SubmitOutcome::single(hash, amount, p.limit_price))
    }

    fn should_complete(&self, order: &Order, _ctx: &EvalContext) -> bool {
        order.trigger_count >= 1
    }

    fn is_expired(&self, order: &Order, now_ms: i64) -> bool {
        match Self::params(order).and_then(|p| p.expiry_days) {
            Some(expiry) => now_ms > order.expiry_cutoff_ms(expiry),
            None => false,
        }
    }
}
