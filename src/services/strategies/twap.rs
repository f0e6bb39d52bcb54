//! TWAP Strategy
//!
//! Splits `amount` into equal slices across `[start_date, end_date]`, one
//! per `interval` milliseconds. `next_trigger_value` is the next slice
//! timestamp (epoch ms).

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{offset_limit_price, EvalContext, Strategy, SubmitOutcome};
use crate::error::EngineError;
use crate::models::{Order, OrderParams, OrderType, TwapParams};
use crate::services::submission::SubmissionClient;

pub struct TwapStrategy;

impl TwapStrategy {
    fn params(order: &Order) -> Option<&TwapParams> {
        match &order.params {
            OrderParams::Twap(p) => Some(p),
            _ => None,
        }
    }

    /// Total slice count over the schedule: `ceil((end - start) / interval)`
    pub fn slice_count(p: &TwapParams) -> i64 {
        let span = p.end_date - p.start_date;
        if span <= 0 || p.interval <= 0 {
            return 0;
        }
        (span + p.interval - 1) / p.interval
    }

    fn slice_size(p: &TwapParams, remaining: Decimal) -> Decimal {
        let slices = Self::slice_count(p);
        if slices == 0 {
            return Decimal::ZERO;
        }
        (p.amount / Decimal::from(slices)).min(remaining)
    }
}

#[async_trait]
impl Strategy for TwapStrategy {
    fn order_type(&self) -> OrderType {
        OrderType::Twap
    }

    fn validate(&self, order: &Order) -> Result<(), EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected twap params".into()))?;
        if p.amount <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("amount must be positive".into()));
        }
        if p.end_date <= p.start_date {
            return Err(EngineError::InvalidParams(
                "endDate must be after startDate".into(),
            ));
        }
        if p.interval <= 0 {
            return Err(EngineError::InvalidParams("interval must be positive".into()));
        }
        Ok(())
    }

    fn initialize(&self, order: &mut Order, _ctx: &EvalContext) -> Result<(), EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected twap params".into()))?;
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

        if Decimal::from(ctx.now_ms) < next_at || ctx.now_ms > p.end_date {
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
            .ok_or_else(|| EngineError::InvalidParams("expected twap params".into()))?;
        let mid = ctx
            .mid()
            .ok_or_else(|| EngineError::PriceMissing("twap slice".into()))?;

        let slices = Self::slice_count(p);
        // the final slice sweeps any rounding remainder
        let amount = if i64::from(order.trigger_count) + 1 >= slices {
            order.remaining_size
        } else {
            Self::slice_size(p, order.remaining_size)
        };

        let limit_price = offset_limit_price(mid);
        let hash = client.submit(order, amount, limit_price).await?;
        Ok(SubmitOutcome::single(hash, amount, limit_price))
    }

    fn update_next_trigger(&self, order: &mut Order, _ctx: &EvalContext) {
        let Some(p) = Self::params(order) else {
            return;
        };
        let interval = Decimal::from(p.interval);
        if let Some(next_at) = order.next_trigger_value {
            order.next_trigger_value = Some(next_at + interval);
        }
    }

    fn should_complete(&self, order: &Order, ctx: &EvalContext) -> bool {
        let Some(p) = Self::params(order) else {
            return true;
        };
        ctx.now_ms >= p.end_date
            || i64::from(order.trigger_count) >= Self::slice_count(p)
            || order.remaining_size.is_zero()
    }
}
