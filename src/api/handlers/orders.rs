//! Order API Handlers
//!
//! Control surface over the order registry: create, cancel, modify and
//! query advanced orders. Validation errors map to 400 with a stable
//! error code; unknown ids map to 404.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{CreateOrderRequest, ModifyOrderRequest, OrderEvent, OrderResponse};
use crate::utils::response::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ModifyOrderResponse {
    pub new_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub maker: Option<String>,
    pub status: Option<String>,
}

/// Create a new advanced order
/// POST /orders
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    let order = state.registry.create(req).await?;
    Ok((StatusCode::CREATED, Json(CreateOrderResponse { id: order.id })))
}

/// Cancel an order
/// DELETE /orders/:order_id
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.registry.cancel(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace an order with a patched copy under a fresh id
/// PATCH /orders/:order_id
pub async fn modify_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Json(patch): Json<ModifyOrderRequest>,
) -> Result<Json<ModifyOrderResponse>, AppError> {
    let replacement = state.registry.modify(order_id, patch).await?;
    Ok(Json(ModifyOrderResponse {
        new_id: replacement.id,
    }))
}

/// Get a single order
/// GET /orders/:order_id
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state
        .registry
        .get(order_id)
        .await?
        .ok_or_else(|| AppError::not_found("order not found"))?;
    Ok(Json(order.into()))
}

/// List orders, filtered by maker and/or status
/// GET /orders?maker=&status=
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = match &query.maker {
        Some(maker) => state.registry.list_by_maker(maker).await?,
        None => state.registry.list_active().await?,
    };

    let status_filter = query.status.as_deref().map(str::to_lowercase);
    let orders = orders
        .into_iter()
        .filter(|o| match &status_filter {
            Some(status) => o.status.to_string() == *status,
            None => true,
        })
        .map(OrderResponse::from)
        .collect();

    Ok(Json(orders))
}

/// Event history for an order
/// GET /orders/:order_id/events
pub async fn get_order_events(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<OrderEvent>>, AppError> {
    state
        .registry
        .get(order_id)
        .await?
        .ok_or_else(|| AppError::not_found("order not found"))?;
    let events = state.registry.events(order_id).await?;
    Ok(Json(events))
}
