//! Range Strategy
//!
//! Scales into a move by laddering `[start_price, end_price]` in
//! `step_pct` steps. `next_trigger_value` holds the current step price;
//! crossing is directional, following the sign of `end - start`.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{EvalContext, Strategy, SubmitOutcome};
use crate::error::EngineError;
use crate::models::{Order, OrderParams, OrderType, RangeParams};
use crate::services::submission::SubmissionClient;

pub struct RangeStrategy;

impl RangeStrategy {
    fn params(order: &Order) -> Option<&RangeParams> {
        match &order.params {
            OrderParams::Range(p) => Some(p),
            _ => None,
        }
    }

    /// Signed step: negative when the ladder descends
    fn step(p: &RangeParams) -> Decimal {
        let width = (p.end_price - p.start_price).abs();
        let magnitude = width * p.step_pct / Decimal::from(100);
        if p.end_price < p.start_price {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Total rung count: `ceil(100 / step_pct)`
    pub fn step_count(p: &RangeParams) -> i64 {
        let hundred = Decimal::from(100);
        if p.step_pct <= Decimal::ZERO {
            return 0;
        }
        let steps = (hundred / p.step_pct).ceil();
        steps.try_into().unwrap_or(0)
    }

    fn descending(p: &RangeParams) -> bool {
        p.end_price < p.start_price
    }

    /// True once `price` has crossed `level` in the direction of travel
    fn crossed(p: &RangeParams, price: Decimal, level: Decimal) -> bool {
        if Self::descending(p) {
            price <= level
        } else {
            price >= level
        }
    }
}

#[async_trait]
impl Strategy for RangeStrategy {
    fn order_type(&self) -> OrderType {
        OrderType::Range
    }

    fn validate(&self, order: &Order) -> Result<(), EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected range params".into()))?;
        if p.amount <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("amount must be positive".into()));
        }
        if p.start_price <= Decimal::ZERO || p.end_price <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("prices must be positive".into()));
        }
        if p.start_price == p.end_price {
            return Err(EngineError::InvalidParams(
                "startPrice and endPrice must differ".into(),
            ));
        }
        if p.step_pct <= Decimal::ZERO || p.step_pct > Decimal::from(100) {
            return Err(EngineError::InvalidParams(
                "stepPct must be in (0, 100]".into(),
            ));
        }
        if p.expiry_days <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("expiry must be positive".into()));
        }
        Ok(())
    }

    fn initialize(&self, order: &mut Order, _ctx: &EvalContext) -> Result<(), EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected range params".into()))?;
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

        // past the far end of the ladder the order only completes
        let past_end = if Self::descending(p) {
            level < p.end_price
        } else {
            level > p.end_price
        };
        if past_end {
            return false;
        }

        Self::crossed(p, mid, level)
    }

    async fn submit(
        &self,
        order: &Order,
        _ctx: &EvalContext,
        client: &dyn SubmissionClient,
    ) -> Result<SubmitOutcome, EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected range params".into()))?;
        let level = order
            .next_trigger_value
            .ok_or_else(|| EngineError::InvalidParams("range ladder not seeded".into()))?;

        let steps = Self::step_count(p).max(1);
        let amount = (p.amount / Decimal::from(steps)).min(order.remaining_size);
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
        if order.remaining_size.is_zero() || self.is_expired(order, ctx.now_ms) {
            return true;
        }
        // the market ran beyond the far end of the range
        if let Some(mid) = ctx.mid() {
            let beyond = if Self::descending(p) {
                mid < p.end_price
            } else {
                mid > p.end_price
            };
            if beyond {
                return true;
            }
        }
        // ladder consumed: the next level lies beyond the end price
        match order.next_trigger_value {
            Some(level) if Self::descending(p) => level < p.end_price,
            Some(level) => level > p.end_price,
            None => false,
        }
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

    fn range_down() -> Order {
        let mut order = order_with(
            OrderParams::Range(RangeParams {
                amount: dec!(2.0),
                start_price: dec!(3980),
                end_price: dec!(3800),
                step_pct: dec!(2),
                expiry_days: dec!(7),
            }),
            dec!(2.0),
        );
        order.next_trigger_value = Some(dec!(3980));
        order
    }

    #[test]
    fn test_step_is_signed() {
        let p = RangeParams {
            amount: dec!(2),
            start_price: dec!(3980),
            end_price: dec!(3800),
            step_pct: dec!(2),
            expiry_days: dec!(7),
        };
        assert_eq!(RangeStrategy::step(&p), dec!(-3.6));
        assert_eq!(RangeStrategy::step_count(&p), 50);

        let up = RangeParams {
            start_price: dec!(3800),
            end_price: dec!(3980),
            ..p
        };
        assert_eq!(RangeStrategy::step(&up), dec!(3.6));
    }

    #[test]
    fn test_descending_crossing() {
        let order = range_down();
        let now = order.created_at.timestamp_millis();
        let s = RangeStrategy;

        // above the first rung: no trigger
        assert!(!s.should_trigger(&order, &ctx_with_mid(now, dec!(4000))));
        // at and below the rung: trigger
        assert!(s.should_trigger(&order, &ctx_with_mid(now, dec!(3980))));
        assert!(s.should_trigger(&order, &ctx_with_mid(now, dec!(3960))));
    }

    #[tokio::test]
    async fn test_steps_advance_toward_end() {
        let mut order = range_down();
        let now = order.created_at.timestamp_millis();
        let client = MockSubmissionClient::new();
        let s = RangeStrategy;
        let ctx = ctx_with_mid(now, dec!(3980));

        let outcome = s.submit(&order, &ctx, &client).await.unwrap();
        assert_eq!(outcome.amount, dec!(0.04)); // 2.0 over 50 rungs
        assert_eq!(outcome.limit_price, dec!(3980));

        s.update_next_trigger(&mut order, &ctx);
        assert_eq!(order.next_trigger_value, Some(dec!(3976.4)));
    }

    #[test]
    fn test_completes_past_end() {
        let mut order = range_down();
        let now = order.created_at.timestamp_millis();
        order.next_trigger_value = Some(dec!(3799));
        assert!(RangeStrategy.should_complete(&order, &ctx_with_mid(now, dec!(3795))));
        assert!(!RangeStrategy.should_trigger(&order, &ctx_with_mid(now, dec!(3795))));
    }

    #[test]
    fn test_validate() {
        let mut order = range_down();
        assert!(RangeStrategy.validate(&order).is_ok());

        order.params = OrderParams::Range(RangeParams {
            amount: dec!(2),
            start_price: dec!(3980),
            end_price: dec!(3980),
            step_pct: dec!(2),
            expiry_days: dec!(7),
        });
        assert!(RangeStrategy.validate(&order).is_err());
    }
}
