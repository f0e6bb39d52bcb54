//! Chase-Limit Strategy
//!
//! Keeps a resting child order pegged near the market. The peg price lives
//! in `next_trigger_value`; when the mid drifts `distance_pct` away, the
//! previous child is cancelled and a fresh one is placed at the new level.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{offset_limit_price, EvalContext, Strategy, SubmitOutcome};
use crate::error::EngineError;
use crate::models::{ChaseLimitParams, Order, OrderParams, OrderType};
use crate::services::submission::SubmissionClient;

pub struct ChaseLimitStrategy;

impl ChaseLimitStrategy {
    fn params(order: &Order) -> Option<&ChaseLimitParams> {
        match &order.params {
            OrderParams::ChaseLimit(p) => Some(p),
            _ => None,
        }
    }
}

#[async_trait]
impl Strategy for ChaseLimitStrategy {
    fn order_type(&self) -> OrderType {
        OrderType::ChaseLimit
    }

    fn validate(&self, order: &Order) -> Result<(), EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected chase-limit params".into()))?;
        if p.distance_pct <= Decimal::ZERO || p.distance_pct >= Decimal::from(100) {
            return Err(EngineError::InvalidParams(
                "distancePct must be in (0, 100)".into(),
            ));
        }
        if p.expiry_days <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("expiry must be positive".into()));
        }
        if let Some(max) = p.max_price {
            if max <= Decimal::ZERO {
                return Err(EngineError::InvalidParams("maxPrice must be positive".into()));
            }
        }
        Ok(())
    }

    /// The peg must be seeded from a live mid; creation without a fresh
    /// price is rejected.
    fn initialize(&self, order: &mut Order, ctx: &EvalContext) -> Result<(), EngineError> {
        let mid = ctx
            .mid()
            .ok_or_else(|| EngineError::InvalidParams("no fresh price to seed peg".into()))?;
        order.next_trigger_value = Some(mid);
        Ok(())
    }

    fn should_trigger(&self, order: &Order, ctx: &EvalContext) -> bool {
        let Some(p) = Self::params(order) else {
            return false;
        };
        let Some(mid) = ctx.mid() else {
            return false;
        };
        let Some(peg) = order.next_trigger_value else {
            return false;
        };
        if peg.is_zero() {
            return false;
        }

        if let Some(max) = p.max_price {
            if mid > max {
                return false;
            }
        }

        let drift = ((mid - peg) / peg).abs() * Decimal::from(100);
        drift >= p.distance_pct
    }

    async fn submit(
        &self,
        order: &Order,
        ctx: &EvalContext,
        client: &dyn SubmissionClient,
    ) -> Result<SubmitOutcome, EngineError> {
        let mid = ctx
            .mid()
            .ok_or_else(|| EngineError::PriceMissing("chase re-peg".into()))?;

        // drop the stale peg before placing the replacement
        if let Some(previous) = order.one_inch_order_hashes.last() {
            if let Err(e) = client.cancel(previous).await {
                tracing::warn!(
                    order_id = %order.id,
                    order_hash = %previous,
                    "failed to cancel previous chase child: {}",
                    e
                );
            }
        }

        let limit_price = offset_limit_price(mid);
        let amount = order.remaining_size;
        let hash = client.submit(order, amount, limit_price).await?;
        // replacement placement: remaining size is unchanged until a fill
        Ok(SubmitOutcome::repeg(hash, amount, limit_price))
    }

    /// Re-peg to the mid that caused the trigger
    fn update_next_trigger(&self, order: &mut Order, ctx: &EvalContext) {
        if let Some(mid) = ctx.mid() {
            order.next_trigger_value = Some(mid);
        }
    }

    fn should_complete(&self, order: &Order, ctx: &EvalContext) -> bool {
        order.remaining_size.is_zero() || self.is_expired(order, ctx.now_ms)
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

    fn chase_order(max_price: Option<Decimal>) -> Order {
        let mut order = order_with(
            OrderParams::ChaseLimit(ChaseLimitParams {
                distance_pct: dec!(3),
                expiry_days: dec!(7),
                max_price,
            }),
            dec!(1.0),
        );
        order.next_trigger_value = Some(dec!(4000));
        order
    }

    #[test]
    fn test_initialize_seeds_peg() {
        let mut order = chase_order(None);
        order.next_trigger_value = None;
        let now = order.created_at.timestamp_millis();

        ChaseLimitStrategy
            .initialize(&mut order, &ctx_with_mid(now, dec!(4000)))
            .unwrap();
        assert_eq!(order.next_trigger_value, Some(dec!(4000)));

        let mut other = chase_order(None);
        other.next_trigger_value = None;
        let no_price = EvalContext::new(now, None, 60_000);
        assert!(ChaseLimitStrategy.initialize(&mut other, &no_price).is_err());
    }

    #[test]
    fn test_triggers_on_drift_either_direction() {
        let order = chase_order(None);
        let now = order.created_at.timestamp_millis();
        let s = ChaseLimitStrategy;

        // 4% up from the 4000 peg
        assert!(s.should_trigger(&order, &ctx_with_mid(now, dec!(4160))));
        // 4% down
        assert!(s.should_trigger(&order, &ctx_with_mid(now, dec!(3840))));
        // 2% is inside the band
        assert!(!s.should_trigger(&order, &ctx_with_mid(now, dec!(4080))));
        // exactly 3%
        assert!(s.should_trigger(&order, &ctx_with_mid(now, dec!(4120))));
    }

    #[test]
    fn test_max_price_cap() {
        let order = chase_order(Some(dec!(4500)));
        let now = order.created_at.timestamp_millis();
        assert!(ChaseLimitStrategy.should_trigger(&order, &ctx_with_mid(now, dec!(4160))));
        assert!(!ChaseLimitStrategy.should_trigger(&order, &ctx_with_mid(now, dec!(4600))));
    }

    #[tokio::test]
    async fn test_repeg_cancels_previous_child() {
        let mut order = chase_order(None);
        order.one_inch_order_hashes = vec!["0xfirst".to_string()];
        let now = order.created_at.timestamp_millis();
        let client = MockSubmissionClient::new();

        let ctx = ctx_with_mid(now, dec!(4160));
        let outcome = ChaseLimitStrategy.submit(&order, &ctx, &client).await.unwrap();

        assert_eq!(client.cancelled(), vec!["0xfirst".to_string()]);
        assert_eq!(outcome.amount, dec!(1.0));

        ChaseLimitStrategy.update_next_trigger(&mut order, &ctx);
        assert_eq!(order.next_trigger_value, Some(dec!(4160)));
    }

    #[test]
    fn test_completes_on_expiry_or_exhaustion() {
        let mut order = chase_order(None);
        let now = order.created_at.timestamp_millis();
        let s = ChaseLimitStrategy;

        assert!(!s.should_complete(&order, &ctx_with_mid(now, dec!(4000))));

        order.remaining_size = Decimal::ZERO;
        assert!(s.should_complete(&order, &ctx_with_mid(now, dec!(4000))));

        let order = chase_order(None);
        let expired = ctx_with_mid(now + 8 * 86_400_000, dec!(4000));
        assert!(s.should_complete(&order, &expired));
    }
}
