//! Conditional-order execution engine for an on-chain limit-order protocol.
//!
//! Makers submit signed advanced-order intents (TWAP, DCA, range, iceberg,
//! grid, chase-limit, stop-limit, momentum-reversal, range-breakout); the
//! engine persists each intent, watches market conditions, and emits
//! concrete limit orders against the maker's delegate proxy when a trigger
//! fires.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

use crate::config::AppConfig;
use crate::services::price_feed::PriceFeedService;
use crate::services::registry::OrderRegistry;
use crate::services::watcher::WatcherScheduler;

pub struct AppState {
    pub config: AppConfig,
    pub registry: OrderRegistry,
    pub scheduler: Arc<WatcherScheduler>,
    pub prices: Arc<PriceFeedService>,
    pub metrics: Option<PrometheusHandle>,
}
