//! DCA Strategy
//!
//! Recurring buy of `amount` every `interval_days`, unbounded end. Runs
//! until the parent size is exhausted or the maker cancels.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{offset_limit_price, EvalContext, Strategy, SubmitOutcome};
use crate::error::EngineError;
use crate::models::{DcaParams, Order, OrderParams, OrderType};
use crate::services::submission::SubmissionClient;

pub struct DcaStrategy;

impl DcaStrategy {
    fn params(order: &Order) -> Option<&DcaParams> {
        match &order.params {
            OrderParams::Dca(p) => Some(p),
            _ => None,
        }
    }

    fn interval_ms(p: &DcaParams) -> Decimal {
        p.interval_days * Decimal::from(86_400_000i64)
    }
}

#[async_trait]
impl Strategy for DcaStrategy {
    fn order_type(&self) -> OrderType {
        OrderType::Dca
    }

    fn validate(&self, order: &Order) -> Result<(), EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected dca params".into()))?;
        if p.amount <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("amount must be positive".into()));
        }
        if p.interval_days <= Decimal::ZERO {
            return Err(EngineError::InvalidParams(
                "intervalDays must be positive".into(),
            ));
        }
        Ok(())
    }

    fn initialize(&self, order: &mut Order, _ctx: &EvalContext) -> Result<(), EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected dca params".into()))?;
        order.next_trigger_value = Some(Decimal::from(p.start_date));
        Ok(())
    }

    fn should_trigger(&self, order: &Order, ctx: &EvalContext) -> bool {
        let Some(p) = Self::params(order) else {
            return false;
        };
        let Some(mid) = ctx.mid() else {
            return false;
        };
        let Some(next_at) = order.next_trigger_value else {
            return false;
        };

        if Decimal::from(ctx.now_ms) < next_at {
            return false;
        }
        if let Some(max) = p.max_price {
            if mid > max {
                return false;
            }
        }
        true
    }

    async fn submit(
        &self,
        order: &Order,
        ctx: &EvalContext,
        client: &dyn SubmissionClient,
    ) -> Result<SubmitOutcome, EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected dca params".into()))?;
        let mid = ctx
            .mid()
            .ok_or_else(|| EngineError::PriceMissing("dca buy".into()))?;

        let amount = p.amount.min(order.remaining_size);
        let limit_price = offset_limit_price(mid);
        let hash = client.submit(order, amount, limit_price).await?;
        Ok(SubmitOutcome::single(hash, amount, limit_price))
    }

    fn update_next_trigger(&self, order: &mut Order, _ctx: &EvalContext) {
        let Some(p) = Self::params(order) else {
            return;
        };
        let interval = Self::interval_ms(p);
        if let Some(next_at) = order.next_trigger_value {
            order.next_trigger_value = Some(next_at + interval);
        }
    }

    fn should_complete(&self, order: &Order, _ctx: &EvalContext) -> bool {
        order.remaining_size.is_zero()
    }
}
