use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::AppState;

pub fn create_router(_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        // Orders
        .route("/orders", post(handlers::orders::create_order))
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:order_id", get(handlers::orders::get_order))
        .route("/orders/:order_id", delete(handlers::orders::cancel_order))
        .route("/orders/:order_id", patch(handlers::orders::modify_order))
        .route(
            "/orders/:order_id/events",
            get(handlers::orders::get_order_events),
        )
}

pub fn internal_router(_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new().route("/ticker", post(handlers::internal::push_ticker))
}
