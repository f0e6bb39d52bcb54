use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use super::params::OrderParams;

// Helper module to serialize DateTime as milliseconds timestamp
pub mod datetime_as_millis {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(dt.timestamp_millis())
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::Serializer;

        pub fn serialize<S>(
            dt: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match dt {
                Some(dt) => serializer.serialize_i64(dt.timestamp_millis()),
                None => serializer.serialize_none(),
            }
        }
    }
}

/// Advanced order type. Each variant maps to one trigger strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "snake_case")]
pub enum OrderType {
    StopLimit,
    ChaseLimit,
    Twap,
    Range,
    Iceberg,
    Dca,
    GridTrading,
    MomentumReversal,
    RangeBreakout,
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderType::StopLimit => "stop_limit",
            OrderType::ChaseLimit => "chase_limit",
            OrderType::Twap => "twap",
            OrderType::Range => "range",
            OrderType::Iceberg => "iceberg",
            OrderType::Dca => "dca",
            OrderType::GridTrading => "grid_trading",
            OrderType::MomentumReversal => "momentum_reversal",
            OrderType::RangeBreakout => "range_breakout",
            OrderType::Limit => "limit",
        };
        write!(f, "{}", s)
    }
}

/// Parent-order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Active,
    PartiallyFilled,
    Filled,
    Completed,
    Cancelled,
    Expired,
    Failed,
}

impl OrderStatus {
    /// Statuses the scheduler still owes a watcher
    pub fn is_watchable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Active | OrderStatus::PartiallyFilled
        )
    }

    /// Terminal statuses never mutate again
    pub fn is_terminal(&self) -> bool {
        !self.is_watchable()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Active => "active",
            OrderStatus::PartiallyFilled => "partially_filled",
            OrderStatus::Filled => "filled",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Expired => "expired",
            OrderStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A user's advanced-order intent. Owned by the store; the scheduler and
/// strategies work on snapshots and write back through the store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_type: OrderType,
    pub maker: String,
    pub maker_asset: String,
    pub taker_asset: String,
    pub chain_id: i64,
    pub size: Decimal,
    pub remaining_size: Decimal,
    #[sqlx(json)]
    pub params: OrderParams,
    pub signature: String,
    pub user_signed_payload: String,
    pub status: OrderStatus,
    pub trigger_count: i32,
    pub next_trigger_value: Option<Decimal>,
    #[sqlx(json)]
    pub one_inch_order_hashes: Vec<String>,
    #[serde(serialize_with = "datetime_as_millis::serialize")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "datetime_as_millis::option::serialize")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "datetime_as_millis::option::serialize")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Aggregated-ticker symbol for this order's trading pair, e.g.
    /// `agg:spot:ETHUSDT` when the asset mapping resolves WETH/USDT.
    pub fn symbol(&self, resolve: impl Fn(&str) -> Option<String>) -> Option<String> {
        let base = resolve(&self.maker_asset)?;
        let quote = resolve(&self.taker_asset)?;
        Some(format!("agg:spot:{}{}", base, quote))
    }

    /// Absolute cutoff for strategies carrying an `expiry_days` parameter
    pub fn expiry_cutoff_ms(&self, expiry_days: Decimal) -> i64 {
        let days_ms = (expiry_days * Decimal::from(86_400_000i64)).trunc();
        let offset: i64 = days_ms.try_into().unwrap_or(i64::MAX);
        self.created_at.timestamp_millis().saturating_add(offset)
    }
}

/// Append-only audit record; one row per lifecycle transition and per submit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderEvent {
    #[serde(default)]
    pub id: i64,
    pub order_id: Uuid,
    pub order_hash: Option<String>,
    pub status: OrderStatus,
    #[serde(serialize_with = "datetime_as_millis::serialize")]
    pub timestamp: DateTime<Utc>,
    pub filled_amount: Option<Decimal>,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
}

impl OrderEvent {
    pub fn transition(order: &Order, status: OrderStatus) -> Self {
        Self {
            id: 0,
            order_id: order.id,
            order_hash: None,
            status,
            timestamp: Utc::now(),
            filled_amount: None,
            tx_hash: None,
            error: None,
        }
    }

    pub fn submitted(order: &Order, order_hash: &str, filled_amount: Decimal) -> Self {
        Self {
            id: 0,
            order_id: order.id,
            order_hash: Some(order_hash.to_string()),
            status: OrderStatus::Active,
            timestamp: Utc::now(),
            filled_amount: Some(filled_amount),
            tx_hash: None,
            error: None,
        }
    }

    pub fn failed(order: &Order, error: &str) -> Self {
        Self {
            id: 0,
            order_id: order.id,
            order_hash: None,
            status: OrderStatus::Failed,
            timestamp: Utc::now(),
            filled_amount: None,
            tx_hash: None,
            error: Some(error.to_string()),
        }
    }
}

/// Intent payload accepted by `POST /orders`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub maker: String,
    pub maker_asset: String,
    pub taker_asset: String,
    #[serde(default)]
    pub chain_id: Option<i64>,
    pub size: Decimal,
    pub params: OrderParams,
    pub signature: String,
}

/// Patch payload accepted by `PATCH /orders/:id`. Semantically cancel +
/// re-create: patched fields must be covered by a fresh maker signature.
#[derive(Debug, Clone, Deserialize)]
pub struct ModifyOrderRequest {
    #[serde(default)]
    pub size: Option<Decimal>,
    #[serde(default)]
    pub params: Option<OrderParams>,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub maker: String,
    pub maker_asset: String,
    pub taker_asset: String,
    pub chain_id: i64,
    pub size: Decimal,
    pub remaining_size: Decimal,
    pub status: OrderStatus,
    pub trigger_count: i32,
    pub next_trigger_value: Option<Decimal>,
    pub one_inch_order_hashes: Vec<String>,
    #[serde(serialize_with = "datetime_as_millis::serialize")]
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            order_type: order.order_type,
            maker: order.maker,
            maker_asset: order.maker_asset,
            taker_asset: order.taker_asset,
            chain_id: order.chain_id,
            size: order.size,
            remaining_size: order.remaining_size,
            status: order.status,
            trigger_count: order.trigger_count,
            next_trigger_value: order.next_trigger_value,
            one_inch_order_hashes: order.one_inch_order_hashes,
            created_at: order.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::params::StopLimitParams;
    use rust_decimal_macros::dec;

    fn sample_order() -> Order {
        Order {
            id: Uuid::new_v4(),
            order_type: OrderType::StopLimit,
            maker: "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".to_string(),
            maker_asset: "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".to_string(),
            taker_asset: "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
            chain_id: 1,
            size: dec!(1.0),
            remaining_size: dec!(1.0),
            params: OrderParams::StopLimit(StopLimitParams {
                stop_price: dec!(4000),
                limit_price: dec!(4100),
                expiry_days: dec!(7),
            }),
            signature: "0xsig".to_string(),
            user_signed_payload: "{}".to_string(),
            status: OrderStatus::Pending,
            trigger_count: 0,
            next_trigger_value: None,
            one_inch_order_hashes: vec![],
            created_at: Utc::now(),
            executed_at: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn test_status_watchable() {
        assert!(OrderStatus::Pending.is_watchable());
        assert!(OrderStatus::Active.is_watchable());
        assert!(OrderStatus::PartiallyFilled.is_watchable());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
    }

    #[test]
    fn test_order_type_roundtrip() {
        let json = serde_json::to_string(&OrderType::GridTrading).unwrap();
        assert_eq!(json, "\"GRID_TRADING\"");
        let back: OrderType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OrderType::GridTrading);
    }

    #[test]
    fn test_symbol_resolution() {
        let order = sample_order();
        let symbol = order.symbol(|addr| match addr {
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2" => Some("ETH".to_string()),
            "0xdac17f958d2ee523a2206206994597c13d831ec7" => Some("USDT".to_string()),
            _ => None,
        });
        assert_eq!(symbol.as_deref(), Some("agg:spot:ETHUSDT"));
        assert_eq!(order.symbol(|_| None), None);
    }

    #[test]
    fn test_expiry_cutoff() {
        let order = sample_order();
        let cutoff = order.expiry_cutoff_ms(dec!(7));
        assert_eq!(
            cutoff,
            order.created_at.timestamp_millis() + 7 * 86_400_000
        );
    }

    #[test]
    fn test_order_serializes_millis() {
        let order = sample_order();
        let json = serde_json::to_value(&order).unwrap();
        assert!(json["created_at"].is_i64());
        assert!(json["cancelled_at"].is_null());
    }
}
