//! Stop-Limit Strategy
//!
//! Arms at `stop_price`; once the mid trades at or through it, places a
//! single child for the full remaining size at `limit_price` and completes.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{EvalContext, Strategy, SubmitOutcome};
use crate::error::EngineError;
use crate::models::{Order, OrderParams, OrderType};
use crate::services::submission::SubmissionClient;

pub struct StopLimitStrategy;

impl StopLimitStrategy {
    fn params(order: &Order) -> Option<&crate::models::StopLimitParams> {
        match &order.params {
            OrderParams::StopLimit(p) => Some(p),
            _ => None,
        }
    }
}

#[async_trait]
impl Strategy for StopLimitStrategy {
    fn order_type(&self) -> OrderType {
        OrderType::StopLimit
    }

    fn validate(&self, order: &Order) -> Result<(), EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected stop-limit params".into()))?;
        if p.stop_price <= Decimal::ZERO || p.limit_price <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("prices must be positive".into()));
        }
        if p.expiry_days <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("expiry must be positive".into()));
        }
        Ok(())
    }

    fn should_trigger(&self, order: &Order, ctx: &EvalContext) -> bool {
        let Some(p) = Self::params(order) else {
            return false;
        };
        let Some(mid) = ctx.mid() else {
            return false;
        };
        // one-shot: never re-arm after the first submit
        order.trigger_count == 0 && mid >= p.stop_price
    }

    async fn submit(
        &self,
        order: &Order,
        _ctx: &EvalContext,
        client: &dyn SubmissionClient,
    ) -> Result<SubmitOutcome, EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected stop-limit params".into()))?;
        let amount = order.remaining_size;
        let hash = client.submit(order, amount, p.limit_price).await?;
        Ok(SubmitOutcome::single(hash, amount, p.limit_price))
    }

    fn should_complete(&self, order: &Order, _ctx: &EvalContext) -> bool {
        order.trigger_count >= 1
    }

    fn is_expired(&self, order: &Order, now_ms: i64) -> bool {
        Self::params(order)
            .map(|p| now_ms > order.expiry_cutoff_ms(p.expiry_days))
            .unwrap_or(false)
    }
}
