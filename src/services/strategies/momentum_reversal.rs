//! Momentum-Reversal Strategy
//!
//! Reversal entry on the collector's RSI series. Long side: the latest
//! RSI crosses upward over its `rsima_period` moving average while the
//! prior sample sat in oversold territory. Mirrored for overbought: the
//! latest RSI crosses downward under its moving average while the prior
//! sample sat above 70, entering on the sell side. One shot either way;
//! `tp_pct`/`sl_pct` ride along as soft exit hints on the submit event.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{discount_limit_price, offset_limit_price, EvalContext, Strategy, SubmitOutcome};
use crate::error::EngineError;
use crate::models::{trailing_sma, MomentumReversalParams, Order, OrderParams, OrderType};
use crate::services::submission::SubmissionClient;

const OVERSOLD: f64 = 30.0;
const OVERBOUGHT: f64 = 70.0;

/// Which reversal pattern fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReversalSignal {
    /// RSI popped up out of oversold; enter long of the mid
    Oversold,
    /// RSI rolled over out of overbought; enter on the sell side
    Overbought,
}

pub struct MomentumReversalStrategy;

impl MomentumReversalStrategy {
    fn params(order: &Order) -> Option<&MomentumReversalParams> {
        match &order.params {
            OrderParams::MomentumReversal(p) => Some(p),
            _ => None,
        }
    }

    /// Cross of RSI against its SMA with the prior sample at an extreme.
    /// Oversold cross-up and overbought cross-down are symmetric.
    fn reversal(rsi: &[f64], rsima_period: usize) -> Option<ReversalSignal> {
        if rsi.len() < rsima_period + 2 {
            return None;
        }

        let last = rsi[rsi.len() - 1];
        let prev = rsi[rsi.len() - 2];
        let ma_now = trailing_sma(rsi, rsima_period, 0)?;
        let ma_prev = trailing_sma(rsi, rsima_period, 1)?;

        if prev < OVERSOLD && prev <= ma_prev && last > ma_now {
            return Some(ReversalSignal::Oversold);
        }
        if prev > OVERBOUGHT && prev >= ma_prev && last < ma_now {
            return Some(ReversalSignal::Overbought);
        }
        None
    }

    fn signal(order: &Order, ctx: &EvalContext) -> Option<ReversalSignal> {
        let p = Self::params(order)?;
        if order.trigger_count > 0 || ctx.mid().is_none() {
            return None;
        }
        let analysis = ctx.analysis()?;
        Self::reversal(&analysis.rsi, p.rsima_period as usize)
    }
}

#[async_trait]
impl Strategy for MomentumReversalStrategy {
    fn order_type(&self) -> OrderType {
        OrderType::MomentumReversal
    }

    fn validate(&self, order: &Order) -> Result<(), EngineError> {
        let p = Self::params(order).ok_or_else(|| {
            EngineError::InvalidParams("expected momentum-reversal params".into())
        })?;
        if p.amount <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("amount must be positive".into()));
        }
        if p.rsi_period == 0 || p.rsima_period == 0 {
            return Err(EngineError::InvalidParams("periods must be positive".into()));
        }
        if p.tp_pct <= Decimal::ZERO || p.sl_pct <= Decimal::ZERO {
            return Err(EngineError::InvalidParams(
                "tpPct and slPct must be positive".into(),
            ));
        }
        Ok(())
    }

    fn should_trigger(&self, order: &Order, ctx: &EvalContext) -> bool {
        Self::signal(order, ctx).is_some()
    }

    async fn submit(
        &self,
        order: &Order,
        ctx: &EvalContext,
        client: &dyn SubmissionClient,
    ) -> Result<SubmitOutcome, EngineError> {
        let p = Self::params(order).ok_or_else(|| {
            EngineError::InvalidParams("expected momentum-reversal params".into())
        })?;
        let mid = ctx
            .mid()
            .ok_or_else(|| EngineError::PriceMissing("momentum entry".into()))?;
        let signal = Self::signal(order, ctx)
            .ok_or_else(|| EngineError::InvalidParams("reversal pattern gone".into()))?;

        let amount = p.amount.min(order.remaining_size);
        // the sell-side entry rests just under the mid, mirroring the long
        let limit_price = match signal {
            ReversalSignal::Oversold => offset_limit_price(mid),
            ReversalSignal::Overbought => discount_limit_price(mid),
        };
        let hash = client.submit(order, amount, limit_price).await?;
        Ok(SubmitOutcome::single(hash, amount, limit_price))
    }

    fn should_complete(&self, order: &Order, _ctx: &EvalContext) -> bool {
        order.trigger_count >= 1
    }
}
