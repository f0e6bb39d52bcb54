//! Iceberg Strategy
//!
//! RANGE with an explicit rung count: `amount / steps` per submit across
//! `[start_price, end_price]`.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{EvalContext, Strategy, SubmitOutcome};
use crate::error::EngineError;
use crate::models::{IcebergParams, Order, OrderParams, OrderType};
use crate::services::submission::SubmissionClient;

pub struct IcebergStrategy;

impl IcebergStrategy {
    fn params(order: &Order) -> Option<&IcebergParams> {
        match &order.params {
            OrderParams::Iceberg(p) => Some(p),
            _ => None,
        }
    }

    fn step(p: &IcebergParams) -> Decimal {
        (p.end_price - p.start_price) / Decimal::from(p.steps.max(1))
    }

    fn descending(p: &IcebergParams) -> bool {
        p.end_price < p.start_price
    }
}

#[async_trait]
impl Strategy for IcebergStrategy {
    fn order_type(&self) -> OrderType {
        OrderType::Iceberg
    }

    fn validate(&self, order: &Order) -> Result<(), EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected iceberg params".into()))?;
        if p.amount <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("amount must be positive".into()));
        }
        if p.steps == 0 {
            return Err(EngineError::InvalidParams("steps must be positive".into()));
        }
        if p.start_price <= Decimal::ZERO || p.end_price <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("prices must be positive".into()));
        }
        if p.start_price == p.end_price {
            return Err(EngineError::InvalidParams(
                "startPrice and endPrice must differ".into(),
            ));
        }
        if p.expiry_days <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("expiry must be positive".into()));
        }
        Ok(())
    }

    fn initialize(&self, order: &mut Order, _ctx: &EvalContext) -> Result<(), EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected iceberg params".into()))?;
        order.next_trigger_value = Some(p.start_price);
        Ok(())
    }

    fn should_trigger(&self, order: &Order, ctx: &EvalContext) -> bool {
        let Some(p) = Self::params(order) else {
            return false;
        };
        let Some(mid) = ctx.mid() else {
            return false;
        };
        let Some(level) = order.next_trigger_value else {
            return false;
        };

        if i64::from(order.trigger_count) >= i64::from(p.steps) {
            return false;
        }

        if Self::descending(p) {
            mid <= level
        } else {
            mid >= level
        }
    }

    async fn submit(
        &self,
        order: &Order,
        _ctx: &EvalContext,
        client: &dyn SubmissionClient,
    ) -> Result<SubmitOutcome, EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected iceberg params".into()))?;
        let level = order
            .next_trigger_value
            .ok_or_else(|| EngineError::InvalidParams("iceberg ladder not seeded".into()))?;

        // the final rung sweeps any rounding remainder
        let amount = if order.trigger_count as u32 + 1 >= p.steps {
            order.remaining_size
        } else {
            (p.amount / Decimal::from(p.steps)).min(order.remaining_size)
        };

        let hash = client.submit(order, amount, level).await?;
        Ok(SubmitOutcome::single(hash, amount, level))
    }

    fn update_next_trigger(&self, order: &mut Order, _ctx: &EvalContext) {
        let Some(p) = Self::params(order) else {
            return;
        };
        let step = Self::step(p);
        if let Some(level) = order.next_trigger_value {
            order.next_trigger_value = Some(level + step);
        }
    }

    fn should_complete(&self, order: &Order, ctx: &EvalContext) -> bool {
        let Some(p) = Self::params(order) else {
            return true;
        };
        i64::from(order.trigger_count) >= i64::from(p.steps)
            || order.remaining_size.is_zero()
            || self.is_expired(order, ctx.now_ms)
    }

    fn is_expired(&self, order: &Order, now_ms: i64) -> bool {
        Self::params(order)
            .map(|p| now_ms > order.expiry_cutoff_ms(p.expiry_days))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::strategies::testutil::{ctx_with_mid, order_with};
    use crate::services::submission::MockSubmissionClient;
    use rust_decimal_macros::dec;

    fn iceberg_up() -> Order {
        let mut order = order_with(
            OrderParams::Iceberg(IcebergParams {
                amount: dec!(1.0),
                start_price: dec!(4000),
                end_price: dec!(4200),
                steps: 4,
                expiry_days: dec!(7),
            }),
            dec!(1.0),
        );
        order.next_trigger_value = Some(dec!(4000));
        order
    }

    #[test]
    fn test_ascending_rungs() {
        let order = iceberg_up();
        let now = order.created_at.timestamp_millis();
        assert!(!IcebergStrategy.should_trigger(&order, &ctx_with_mid(now, dec!(3990))));
        assert!(IcebergStrategy.should_trigger(&order, &ctx_with_mid(now, dec!(4000))));
    }

    #[tokio::test]
    async fn test_quarter_per_rung() {
        let mut order = iceberg_up();
        let now = order.created_at.timestamp_millis();
        let client = MockSubmissionClient::new();
        let ctx = ctx_with_mid(now, dec!(4000));
        let s = IcebergStrategy;

        let outcome = s.submit(&order, &ctx, &client).await.unwrap();
        assert_eq!(outcome.amount, dec!(0.25));
        assert_eq!(outcome.limit_price, dec!(4000));

        s.update_next_trigger(&mut order, &ctx);
        assert_eq!(order.next_trigger_value, Some(dec!(4050)));
    }

    #[test]
    fn test_completes_after_all_rungs() {
        let mut order = iceberg_up();
        let now = order.created_at.timestamp_millis();
        order.trigger_count = 4;
        assert!(IcebergStrategy.should_complete(&order, &ctx_with_mid(now, dec!(4300))));
        assert!(!IcebergStrategy.should_trigger(&order, &ctx_with_mid(now, dec!(4300))));
    }
}
