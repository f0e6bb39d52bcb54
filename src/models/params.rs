//! Strategy Parameter Records
//!
//! Each advanced order carries a strategy-specific parameter record. The
//! record is stored as an opaque JSON blob with a `type` discriminator so
//! the reader can reconstruct it without consulting the order row.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::OrderType;

/// Tagged union of all strategy parameter records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderParams {
    StopLimit(StopLimitParams),
    ChaseLimit(ChaseLimitParams),
    Twap(TwapParams),
    Range(RangeParams),
    Iceberg(IcebergParams),
    Dca(DcaParams),
    GridTrading(GridTradingParams),
    MomentumReversal(MomentumReversalParams),
    RangeBreakout(RangeBreakoutParams),
    Limit(LimitParams),
}

impl OrderParams {
    /// The order type this record belongs to. Creation rejects orders whose
    /// declared `type` disagrees with the params discriminator.
    pub fn order_type(&self) -> OrderType {
        match self {
            OrderParams::StopLimit(_) => OrderType::StopLimit,
            OrderParams::ChaseLimit(_) => OrderType::ChaseLimit,
            OrderParams::Twap(_) => OrderType::Twap,
            OrderParams::Range(_) => OrderType::Range,
            OrderParams::Iceberg(_) => OrderType::Iceberg,
            OrderParams::Dca(_) => OrderType::Dca,
            OrderParams::GridTrading(_) => OrderType::GridTrading,
            OrderParams::MomentumReversal(_) => OrderType::MomentumReversal,
            OrderParams::RangeBreakout(_) => OrderType::RangeBreakout,
            OrderParams::Limit(_) => OrderType::Limit,
        }
    }
}

/// One-shot stop entry: arm at `stop_price`, place at `limit_price`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopLimitParams {
    pub stop_price: Decimal,
    pub limit_price: Decimal,
    pub expiry_days: Decimal,
}

/// Trailing re-peg order: follow the mid at `distance_pct`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaseLimitParams {
    pub distance_pct: Decimal,
    pub expiry_days: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Decimal>,
}

/// Time-weighted slicing between `start_date` and `end_date` (epoch ms),
/// one slice per `interval` milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwapParams {
    pub amount: Decimal,
    pub start_date: i64,
    pub end_date: i64,
    pub interval: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Decimal>,
}

/// Price-ladder scaling across `[start_price, end_price]` in `step_pct` steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeParams {
    pub amount: Decimal,
    pub start_price: Decimal,
    pub end_price: Decimal,
    pub step_pct: Decimal,
    pub expiry_days: Decimal,
}

/// Like RANGE but with an explicit rung count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcebergParams {
    pub amount: Decimal,
    pub start_price: Decimal,
    pub end_price: Decimal,
    pub steps: u32,
    pub expiry_days: Decimal,
}

/// Recurring buy: `amount` per `interval` days, unbounded end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DcaParams {
    pub amount: Decimal,
    pub start_date: i64,
    pub interval_days: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Decimal>,
}

/// Static grid of levels spanning `[start_price, end_price]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridTradingParams {
    pub amount: Decimal,
    pub start_price: Decimal,
    pub end_price: Decimal,
    pub step_pct: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_multiplier: Option<Decimal>,
    pub single_side: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tp_pct: Option<Decimal>,
}

/// RSI oversold-reversal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentumReversalParams {
    pub amount: Decimal,
    pub rsi_period: u32,
    pub rsima_period: u32,
    pub tp_pct: Decimal,
    pub sl_pct: Decimal,
}

/// ADX-gated breakout above an EMA band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeBreakoutParams {
    pub amount: Decimal,
    pub adx_period: u32,
    pub adxma_period: u32,
    pub ema_period: u32,
    pub tp_pct: Decimal,
    pub sl_pct: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakout_pct: Option<Decimal>,
}

/// Plain limit order routed through the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitParams {
    pub limit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_days: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_params_tagged_roundtrip() {
        let params = OrderParams::Twap(TwapParams {
            amount: dec!(1.0),
            start_date: 1_700_000_000_000,
            end_date: 1_700_000_040_000,
            interval: 10_000,
            max_price: Some(dec!(4100)),
        });

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["type"], "TWAP");
        assert_eq!(json["interval"], 10_000);

        let back: OrderParams = serde_json::from_str(&json.to_string()).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_params_discriminator_matches_order_type() {
        let params = OrderParams::GridTrading(GridTradingParams {
            amount: dec!(2),
            start_price: dec!(3800),
            end_price: dec!(4200),
            step_pct: dec!(1),
            step_multiplier: None,
            single_side: true,
            tp_pct: None,
        });
        assert_eq!(params.order_type(), crate::models::OrderType::GridTrading);
    }

    #[test]
    fn test_optional_fields_omitted() {
        let params = OrderParams::ChaseLimit(ChaseLimitParams {
            distance_pct: dec!(3),
            expiry_days: dec!(7),
            max_price: None,
        });
        let json = serde_json::to_string(&params).unwrap();
        assert!(!json.contains("maxPrice"));
    }
}
