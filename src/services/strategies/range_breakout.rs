//! Range-Breakout Strategy
//!
//! Trend-confirmed breakout: ADX above its moving average and above the
//! trend threshold, with the mid stretched `breakout_pct` above the EMA.
//! One shot, like MOMENTUM_REVERSAL.

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use super::{offset_limit_price, EvalContext, Strategy, SubmitOutcome};
use crate::error::EngineError;
use crate::models::{trailing_sma, Order, OrderParams, OrderType, RangeBreakoutParams};
use crate::services::submission::SubmissionClient;

/// ADX below this is chop, not trend
const ADX_TREND_THRESHOLD: f64 = 25.0;

/// Default breakout stretch over the EMA when the param is unset
const DEFAULT_BREAKOUT_PCT: &str = "1.0";

pub struct RangeBreakoutStrategy;

impl RangeBreakoutStrategy {
    fn params(order: &Order) -> Option<&RangeBreakoutParams> {
        match &order.params {
            OrderParams::RangeBreakout(p) => Some(p),
            _ => None,
        }
    }

    fn breakout_pct(p: &RangeBreakoutParams) -> Decimal {
        p.breakout_pct
            .unwrap_or_else(|| DEFAULT_BREAKOUT_PCT.parse().unwrap_or(Decimal::ONE))
    }
}

#[async_trait]
impl Strategy for RangeBreakoutStrategy {
    fn order_type(&self) -> OrderType {
        OrderType::RangeBreakout
    }

    fn validate(&self, order: &Order) -> Result<(), EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected range-breakout params".into()))?;
        if p.amount <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("amount must be positive".into()));
        }
        if p.adx_period == 0 || p.adxma_period == 0 || p.ema_period == 0 {
            return Err(EngineError::InvalidParams("periods must be positive".into()));
        }
        if let Some(b) = p.breakout_pct {
            if b <= Decimal::ZERO {
                return Err(EngineError::InvalidParams(
                    "breakoutPct must be positive".into(),
                ));
            }
        }
        Ok(())
    }

    fn should_trigger(&self, order: &Order, ctx: &EvalContext) -> bool {
        let Some(p) = Self::params(order) else {
            return false;
        };
        if order.trigger_count > 0 {
            return false;
        }
        let Some(mid) = ctx.mid() else {
            return false;
        };
        let Some(analysis) = ctx.analysis() else {
            return false;
        };

        let Some(adx_last) = analysis.adx.last().copied() else {
            return false;
        };
        let Some(adxma_last) = trailing_sma(&analysis.adx, p.adxma_period as usize, 0) else {
            return false;
        };
        let Some(ema_last) = analysis.ema.last().copied() else {
            return false;
        };
        let Some(ema_last) = Decimal::from_f64(ema_last) else {
            return false;
        };

        if adx_last <= adxma_last || adx_last <= ADX_TREND_THRESHOLD {
            return false;
        }

        let breakout_level =
            ema_last * (Decimal::ONE + Self::breakout_pct(p) / Decimal::from(100));
        mid >= breakout_level
    }

    async fn submit(
        &self,
        order: &Order,
        ctx: &EvalContext,
        client: &dyn SubmissionClient,
    ) -> Result<SubmitOutcome, EngineError> {
        let p = Self::params(order)
            .ok_or_else(|| EngineError::InvalidParams("expected range-breakout params".into()))?;
        let mid = ctx
            .mid()
            .ok_or_else(|| EngineError::PriceMissing("breakout entry".into()))?;

        let amount = p.amount.min(order.remaining_size);
        let limit_price = offset_limit_price(mid);
        let hash = client.submit(order, amount, limit_price).await?;
        Ok(SubmitOutcome::single(hash, amount, limit_price))
    }

    fn should_complete(&self, order: &Order, _ctx: &EvalContext) -> bool {
        order.trigger_count >= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisSeries, TickerSnapshot};
    use crate::services::strategies::testutil::order_with;
    use rust_decimal_macros::dec;

    fn breakout_order() -> Order {
        order_with(
            OrderParams::RangeBreakout(RangeBreakoutParams {
                amount: dec!(1.0),
                adx_period: 14,
                adxma_period: 3,
                ema_period: 20,
                tp_pct: dec!(5),
                sl_pct: dec!(2),
                breakout_pct: None,
            }),
            dec!(1.0),
        )
    }

    fn ctx(now_ms: i64, mid: Decimal, adx: Vec<f64>, ema: Vec<f64>) -> EvalContext {
        EvalContext::new(
            now_ms,
            Some(TickerSnapshot {
                symbol: "agg:spot:ETHUSDT".to_string(),
                mid,
                bid: mid - dec!(1),
                ask: mid + dec!(1),
                last: mid,
                timestamp: now_ms,
                analysis: Some(AnalysisSeries {
                    adx,
                    ema,
                    ..Default::default()
                }),
            }),
            60_000,
        )
    }

    #[test]
    fn test_breakout_fires_with_trend_and_stretch() {
        let order = breakout_order();
        let now = order.created_at.timestamp_millis();

        // ADX rising above its MA and above 25; mid 1% above the 4000 EMA
        let ctx = ctx(now, dec!(4040), vec![20.0, 24.0, 30.0], vec![3990.0, 4000.0]);
        assert!(RangeBreakoutStrategy.should_trigger(&order, &ctx));
    }

    #[test]
    fn test_no_trigger_in_chop() {
        let order = breakout_order();
        let now = order.created_at.timestamp_millis();

        // ADX under the trend threshold
        let weak = ctx(now, dec!(4040), vec![18.0, 19.0, 21.0], vec![4000.0]);
        assert!(!RangeBreakoutStrategy.should_trigger(&order, &weak));

        // trending but mid has not stretched past the EMA band
        let flat = ctx(now, dec!(4010), vec![20.0, 24.0, 30.0], vec![4000.0]);
        assert!(!RangeBreakoutStrategy.should_trigger(&order, &flat));

        // ADX below its own MA (fading trend)
        let fading = ctx(now, dec!(4040), vec![40.0, 35.0, 30.0], vec![4000.0]);
        assert!(!RangeBreakoutStrategy.should_trigger(&order, &fading));
    }

    #[test]
    fn test_custom_breakout_pct() {
        let mut order = breakout_order();
        if let OrderParams::RangeBreakout(ref mut p) = order.params {
            p.breakout_pct = Some(dec!(2));
        }
        let now = order.created_at.timestamp_millis();

        // 1% stretch no longer clears the 2% requirement
        let one_pct = ctx(now, dec!(4040), vec![20.0, 24.0, 30.0], vec![4000.0]);
        assert!(!RangeBreakoutStrategy.should_trigger(&order, &one_pct));

        let two_pct = ctx(now, dec!(4080), vec![20.0, 24.0, 30.0], vec![4000.0]);
        assert!(RangeBreakoutStrategy.should_trigger(&order, &two_pct));
    }
}
