//! Aggregated Ticker Snapshot
//!
//! Cross-venue consolidated price sample produced by the external price
//! collector, optionally carrying precomputed indicator series.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest aggregated sample for a symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub symbol: String,
    pub mid: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    /// Sample time, ms since epoch
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisSeries>,
}

impl TickerSnapshot {
    /// Age of the sample relative to `now_ms`
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.timestamp)
    }
}

/// Ordered indicator series, oldest first. All series are computed by the
/// collector; the engine only reads the tail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSeries {
    #[serde(default)]
    pub rsi: Vec<f64>,
    #[serde(default)]
    pub ema: Vec<f64>,
    #[serde(default)]
    pub sma: Vec<f64>,
    #[serde(default)]
    pub adx: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macd: Option<MacdSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bb: Option<BollingerSeries>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BollingerSeries {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Simple moving average over the trailing `period` samples of a series.
/// Returns `None` when the series is shorter than the period.
pub fn trailing_sma(series: &[f64], period: usize, offset_from_end: usize) -> Option<f64> {
    if period == 0 {
        return None;
    }
    let end = series.len().checked_sub(offset_from_end)?;
    let start = end.checked_sub(period)?;
    let window = &series[start..end];
    Some(window.iter().sum::<f64>() / period as f64)
}
