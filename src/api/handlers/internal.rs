//! Internal API Handlers
//!
//! Collector-facing ingest endpoints. The price collector pushes
//! aggregated ticker snapshots here; nothing on this surface is exposed
//! to makers.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::models::TickerSnapshot;
use crate::AppState;

/// Ingest one aggregated ticker snapshot
/// POST /internal/ticker
pub async fn push_ticker(
    State(state): State<Arc<AppState>>,
    Json(snapshot): Json<TickerSnapshot>,
) -> StatusCode {
    tracing::debug!(
        symbol = %snapshot.symbol,
        mid = %snapshot.mid,
        timestamp = snapshot.timestamp,
        "ticker push"
    );
    crate::metrics::record_ticker_update();
    state.prices.update_ticker(snapshot).await;
    StatusCode::NO_CONTENT
}

/// Prometheus scrape endpoint
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
