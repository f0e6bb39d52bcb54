//! Metrics Module
//!
//! Prometheus-compatible metrics for monitoring:
//! - Registry operations (orders created / cancelled)
//! - Watcher activity (active loops, triggers fired, terminal outcomes)
//! - Submission outcomes (failures)
//! - Price feed ingest

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Metric names as constants for consistency
pub mod names {
    pub const ORDERS_CREATED_TOTAL: &str = "orders_created_total";
    pub const ORDERS_CANCELLED_TOTAL: &str = "orders_cancelled_total";
    pub const ORDERS_COMPLETED_TOTAL: &str = "orders_completed_total";
    pub const ORDERS_FILLED_TOTAL: &str = "orders_filled_total";
    pub const ORDERS_FAILED_TOTAL: &str = "orders_failed_total";

    pub const WATCHERS_ACTIVE: &str = "watchers_active";
    pub const TRIGGERS_FIRED_TOTAL: &str = "triggers_fired_total";
    pub const SUBMISSION_FAILURES_TOTAL: &str = "submission_failures_total";

    pub const TICKER_UPDATES_TOTAL: &str = "ticker_updates_total";
}

/// Install the Prometheus recorder and return the scrape handle
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("failed to install metrics recorder: {}", e);
            None
        }
    }
}

// ============================================================================
// Registry Metrics
// ============================================================================

/// Record order creation
pub fn record_order_created() {
    counter!(names::ORDERS_CREATED_TOTAL).increment(1);
}

/// Record order cancellation
pub fn record_order_cancelled() {
    counter!(names::ORDERS_CANCELLED_TOTAL).increment(1);
}

// ============================================================================
// Watcher Metrics
// ============================================================================

/// Track live watcher loops
pub fn set_watchers_active(count: usize) {
    gauge!(names::WATCHERS_ACTIVE).set(count as f64);
}

/// Record child orders placed by a trigger
pub fn record_triggers_fired(children: u64) {
    counter!(names::TRIGGERS_FIRED_TOTAL).increment(children);
}

/// Record an order finishing its plan
pub fn record_order_completed() {
    counter!(names::ORDERS_COMPLETED_TOTAL).increment(1);
}

/// Record an order exhausting its size
pub fn record_order_filled() {
    counter!(names::ORDERS_FILLED_TOTAL).increment(1);
}

/// Record an order entering the failed state
pub fn record_order_failed() {
    counter!(names::ORDERS_FAILED_TOTAL).increment(1);
}

// ============================================================================
// Submission Metrics
// ============================================================================

/// Record a rejected or timed-out child submission
pub fn record_submission_failure() {
    counter!(names::SUBMISSION_FAILURES_TOTAL).increment(1);
}

// ============================================================================
// Price Feed Metrics
// ============================================================================

/// Record a collector ticker push
pub fn record_ticker_update() {
    counter!(names::TICKER_UPDATES_TOTAL).increment(1);
}
