//! Grid-Trading Strategy
//!
//! Static ladder of levels spanning `[start_price, end_price]` with
//! `step_pct` spacing, optionally geometric via `step_multiplier`. The
//! index of the last placed level lives in `next_trigger_value`; a trigger
//! fires when the mid enters a different band. `tp_pct` arms one extra
//! take-profit child per fill. The grid never self-completes: it runs
//! until the maker cancels or the size is exhausted.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{EvalContext, Strategy, SubmitOutcome};
use crate::error::EngineError;
use crate::models::{GridTradingParams, Order, OrderParams, OrderType};
use crate::services::submission::SubmissionClient;

/// Ladder size guard; a tighter spacing than this is a parameter error
const MAX_GRID_LEVELS: usize = 200;

pub struct GridTradingStrategy;

impl GridTradingStrategy {
    fn params(order: &Order) -> Option<&GridTradingParams> {
        match &order.params {
            OrderParams::GridTrading(p) => Some(p),
            _ => None,
        }
    }

    /// Ascending ladder levels. Linear spacing is `width · step_pct / 100`;
    /// with `step_multiplier` each subsequent gap grows geometrically.
    pub fn levels(p: &GridTradingParams) -> Vec<Decimal> {
        let lo = p.start_price.min(p.end_price);
        let hi = p.start_price.max(p.end_price);
        let width = hi - lo;
        if width <= Decimal::ZERO || p.step_pct <= Decimal::ZERO {
            return vec![];
        }

        let base_gap = width * p.step_pct / Decimal::from(100);
        let multiplier = p.step_multiplier.unwrap_or(Decimal::ONE);

        let mut levels = Vec::new();
        let mut level = lo;
        let mut gap = base_gap;
        while level <= hi && levels.len() < MAX_GRID_LEVELS {
            levels.push(level);
            level += gap;
            gap *= multiplier;
            if gap <= Decimal::ZERO {
                break;
            }
        }
        levels
    }

    /// Band the mid currently sits in, `None` outside the grid
    fn band(levels: &[Decimal], mid: Decimal) -> Option<usize> {
        let first = *levels.first()?;
        let last = *levels.last()?;
        if mid < first || mid > last {
            return None;
        }
        Some(levels.iter().take_while(|l| **l <= mid).count() - 1)
    }

    fn last_band(order: &Order) -> Option<usize> {
        let v = order.next_trigger_value?;
        let idx: i64 = v.trunc().try_into().ok()?;
        usize::try_from(idx).ok()
    }
}

#[async_trait]
impl Strategy for GridTradingStrategy {
    fn order_type(&self) -> OrderType {
        OrderType::GridTrading
    }

    fn validate(&self, order: &Order) -> Result<(), EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected grid params".into()))?;
        if p.amount <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("amount must be positive".into()));
        }
        if p.start_price <= Decimal::ZERO || p.end_price <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("prices must be positive".into()));
        }
        if p.step_pct <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("stepPct must be positive".into()));
        }
        if let Some(m) = p.step_multiplier {
            if m <= Decimal::ZERO {
                return Err(EngineError::InvalidParams(
                    "stepMultiplier must be positive".into(),
                ));
            }
        }
        let levels = Self::levels(p);
        if levels.len() < 2 {
            return Err(EngineError::InvalidParams(
                "grid needs at least two levels".into(),
            ));
        }
        if levels.len() >= MAX_GRID_LEVELS {
            return Err(EngineError::InvalidParams("grid spacing too tight".into()));
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

        let levels = Self::levels(p);
        let Some(current) = Self::band(&levels, mid) else {
            return false;
        };

        match Self::last_band(order) {
            // first observation inside the grid always places
            None => true,
            Some(last) if p.single_side => current < last,
            Some(last) => current != last,
        }
    }

    async fn submit(
        &self,
        order: &Order,
        ctx: &EvalContext,
        client: &dyn SubmissionClient,
    ) -> Result<SubmitOutcome, EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected grid params".into()))?;
        let mid = ctx
            .mid()
            .ok_or_else(|| EngineError::PriceMissing("grid level".into()))?;

        let levels = Self::levels(p);
        let band = Self::band(&levels, mid)
            .ok_or_else(|| EngineError::InvalidParams("mid left the grid".into()))?;
        let level_price = levels[band];

        let per_level = p.amount / Decimal::from(levels.len() as i64);
        let amount = per_level.min(order.remaining_size);

        let hash = client.submit(order, amount, level_price).await?;
        let mut outcome = SubmitOutcome::single(hash, amount, level_price);

        // optional take-profit child one tp_pct above the fill level
        if let Some(tp_pct) = p.tp_pct {
            let tp_price = level_price * (Decimal::ONE + tp_pct / Decimal::from(100));
            match client.submit(order, amount, tp_price).await {
                Ok(tp_hash) => outcome.extra_hashes.push(tp_hash),
                Err(e) => {
                    tracing::warn!(
                        order_id = %order.id,
                        "take-profit child failed, primary fill stands: {}",
                        e
                    );
                }
            }
        }

        Ok(outcome)
    }

    /// Remember the band just placed
    fn update_next_trigger(&self, order: &mut Order, ctx: &EvalContext) {
        let Some(p) = Self::params(order) else {
            return;
        };
        let Some(mid) = ctx.mid() else {
            return;
        };
        let levels = Self::levels(p);
        if let Some(band) = Self::band(&levels, mid) {
            order.next_trigger_value = Some(Decimal::from(band as i64));
        }
    }

    fn should_complete(&self, order: &Order, _ctx: &EvalContext) -> bool {
        order.remaining_size.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::strategies::testutil::{ctx_with_mid, order_with};
    use crate::services::submission::MockSubmissionClient;
    use rust_decimal_macros::dec;

    fn grid_order(single_side: bool, tp_pct: Option<Decimal>) -> Order {
        order_with(
            OrderParams::GridTrading(GridTradingParams {
                amount: dec!(10),
                start_price: dec!(3800),
                end_price: dec!(4200),
                step_pct: dec!(25),
                step_multiplier: None,
                single_side,
                tp_pct,
            }),
            dec!(10),
        )
    }

    #[test]
    fn test_linear_ladder() {
        let p = GridTradingParams {
            amount: dec!(10),
            start_price: dec!(3800),
            end_price: dec!(4200),
            step_pct: dec!(25),
            step_multiplier: None,
            single_side: false,
            tp_pct: None,
        };
        let levels = GridTradingStrategy::levels(&p);
        assert_eq!(
            levels,
            vec![dec!(3800), dec!(3900), dec!(4000), dec!(4100), dec!(4200)]
        );

        assert_eq!(GridTradingStrategy::band(&levels, dec!(3950)), Some(1));
        assert_eq!(GridTradingStrategy::band(&levels, dec!(4200)), Some(4));
        assert_eq!(GridTradingStrategy::band(&levels, dec!(3700)), None);
        assert_eq!(GridTradingStrategy::band(&levels, dec!(4300)), None);
    }

    #[test]
    fn test_geometric_ladder_grows() {
        let p = GridTradingParams {
            amount: dec!(10),
            start_price: dec!(1000),
            end_price: dec!(2000),
            step_pct: dec!(10),
            step_multiplier: Some(dec!(2)),
            single_side: false,
            tp_pct: None,
        };
        let levels = GridTradingStrategy::levels(&p);
        // gaps: 100, 200, 400, 800 -> 1000, 1100, 1300, 1700
        assert_eq!(levels, vec![dec!(1000), dec!(1100), dec!(1300), dec!(1700)]);
    }

    #[test]
    fn test_triggers_on_band_change() {
        let mut order = grid_order(false, None);
        let now = order.created_at.timestamp_millis();
        let s = GridTradingStrategy;

        // first sight inside the grid
        assert!(s.should_trigger(&order, &ctx_with_mid(now, dec!(3950))));

        order.next_trigger_value = Some(dec!(1));
        assert!(!s.should_trigger(&order, &ctx_with_mid(now, dec!(3950))));
        assert!(s.should_trigger(&order, &ctx_with_mid(now, dec!(4050))));
        assert!(s.should_trigger(&order, &ctx_with_mid(now, dec!(3850))));
        // outside the grid
        assert!(!s.should_trigger(&order, &ctx_with_mid(now, dec!(4500))));
    }

    #[test]
    fn test_single_side_only_buys_down() {
        let mut order = grid_order(true, None);
        order.next_trigger_value = Some(dec!(2));
        let now = order.created_at.timestamp_millis();
        let s = GridTradingStrategy;

        assert!(s.should_trigger(&order, &ctx_with_mid(now, dec!(3850))));
        assert!(!s.should_trigger(&order, &ctx_with_mid(now, dec!(4150))));
    }

    #[tokio::test]
    async fn test_tp_child_counts_toward_triggers() {
        let order = grid_order(false, Some(dec!(2)));
        let now = order.created_at.timestamp_millis();
        let client = MockSubmissionClient::new();

        let outcome = GridTradingStrategy
            .submit(&order, &ctx_with_mid(now, dec!(3950)), &client)
            .await
            .unwrap();

        assert_eq!(outcome.hash_count(), 2);
        let calls = client.submissions();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].limit_price, dec!(3900));
        assert_eq!(calls[1].limit_price, dec!(3978)); // 3900 * 1.02
    }

    #[tokio::test]
    async fn test_band_recorded_after_submit() {
        let mut order = grid_order(false, None);
        let now = order.created_at.timestamp_millis();
        let ctx = ctx_with_mid(now, dec!(4050));

        GridTradingStrategy.update_next_trigger(&mut order, &ctx);
        assert_eq!(order.next_trigger_value, Some(dec!(2)));
    }

    #[test]
    fn test_never_self_completes_until_exhausted() {
        let mut order = grid_order(false, None);
        let now = order.created_at.timestamp_millis();
        assert!(!GridTradingStrategy.should_complete(&order, &ctx_with_mid(now, dec!(3950))));
        order.remaining_size = Decimal::ZERO;
        assert!(GridTradingStrategy.should_complete(&order, &ctx_with_mid(now, dec!(3950))));
    }

    #[test]
    fn test_validate_rejects_tight_spacing() {
        let order = order_with(
            OrderParams::GridTrading(GridTradingParams {
                amount: dec!(10),
                start_price: dec!(3800),
                end_price: dec!(4200),
                step_pct: dec!(0.1),
                step_multiplier: None,
                single_side: false,
                tp_pct: None,
            }),
            dec!(10),
        );
        assert!(GridTradingStrategy.validate(&order).is_err());
    }
}
