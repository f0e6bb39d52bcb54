//! Price Feed Service
//!
//! Read-only view over the latest aggregated ticker per symbol. The
//! external collector pushes snapshots through `update_ticker` (exposed on
//! the internal API); reads are pure in-memory lookups so watcher ticks
//! never block on price access. Pushes write through to the `market_data`
//! cache table best-effort so a restart can warm the map.

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;

use crate::models::TickerSnapshot;
use crate::store::OrderStore;

pub struct PriceFeedService {
    tickers: DashMap<String, TickerSnapshot>,
    store: Option<Arc<dyn OrderStore>>,
}

impl PriceFeedService {
    pub fn new() -> Self {
        Self {
            tickers: DashMap::new(),
            store: None,
        }
    }

    /// Write-through variant used by the service binary
    pub fn with_store(store: Arc<dyn OrderStore>) -> Self {
        Self {
            tickers: DashMap::new(),
            store: Some(store),
        }
    }

    /// Latest snapshot for a symbol. May be stale; callers gate on
    /// `TickerSnapshot::timestamp` via the staleness threshold.
    pub fn get_price(&self, symbol: &str) -> Option<TickerSnapshot> {
        self.tickers.get(symbol).map(|s| s.clone())
    }

    /// Convenience accessor for the mid price
    pub fn get_mid(&self, symbol: &str) -> Option<Decimal> {
        self.get_price(symbol).map(|s| s.mid)
    }

    /// Ingest a collector push. Keeps the newest sample per symbol and
    /// mirrors it into the durable cache when one is attached.
    pub async fn update_ticker(&self, snapshot: TickerSnapshot) {
        let symbol = snapshot.symbol.clone();

        let superseded = self
            .tickers
            .get(&symbol)
            .map(|current| current.timestamp > snapshot.timestamp)
            .unwrap_or(false);
        if superseded {
            tracing::debug!(symbol = %symbol, "discarding out-of-order ticker sample");
            return;
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.cache_ticker(&snapshot).await {
                tracing::warn!(symbol = %symbol, "failed to persist ticker cache: {}", e);
            }
        }

        self.tickers.insert(symbol, snapshot);
    }

    /// Warm the in-memory map from the durable cache on startup
    pub async fn warm_from_store(&self, symbols: &[String], max_age_ms: i64) {
        let Some(store) = &self.store else {
            return;
        };

        let mut warmed = 0usize;
        for symbol in symbols {
            match store.cached_ticker(symbol, max_age_ms).await {
                Ok(Some(snapshot)) => {
                    self.tickers.insert(symbol.clone(), snapshot);
                    warmed += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(symbol = %symbol, "ticker warmup read failed: {}", e);
                }
            }
        }

        tracing::info!("price feed warmed {} of {} symbols", warmed, symbols.len());
    }

    pub fn symbols(&self) -> Vec<String> {
        self.tickers.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for PriceFeedService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snap(symbol: &str, mid: Decimal, timestamp: i64) -> TickerSnapshot {
        TickerSnapshot {
            symbol: symbol.to_string(),
            mid,
            bid: mid - dec!(1),
            ask: mid + dec!(1),
            last: mid,
            timestamp,
            analysis: None,
        }
    }

    #[tokio::test]
    async fn test_latest_sample_wins() {
        let feed = PriceFeedService::new();
        feed.update_ticker(snap("agg:spot:ETHUSDT", dec!(4000), 1_000)).await;
        feed.update_ticker(snap("agg:spot:ETHUSDT", dec!(4100), 2_000)).await;

        assert_eq!(feed.get_mid("agg:spot:ETHUSDT"), Some(dec!(4100)));
    }

    #[tokio::test]
    async fn test_out_of_order_sample_discarded() {
        let feed = PriceFeedService::new();
        feed.update_ticker(snap("agg:spot:ETHUSDT", dec!(4100), 2_000)).await;
        feed.update_ticker(snap("agg:spot:ETHUSDT", dec!(4000), 1_000)).await;

        assert_eq!(feed.get_mid("agg:spot:ETHUSDT"), Some(dec!(4100)));
    }

    #[tokio::test]
    async fn test_missing_symbol() {
        let feed = PriceFeedService::new();
        assert!(feed.get_price("agg:spot:BTCUSDT").is_none());
    }
}
