//! Order creation and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{IdempotencyKey, OrderId, Quantity, ShippingAddress, Sku};
use domain::{CreateOrder, CreateOrderOutcome, OrderService};
use order_store::{NewOrder, Order, OrderStore};
use serde::{Deserialize, Serialize};

use crate::deadline::RequestDeadline;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub order_service: OrderService<S>,
}

// -- Request types --

/// Body of `POST /orders`.
///
/// Field types validate on deserialization, so a request that parses is
/// already well-formed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub quantity: Quantity,
    pub shipping_address: ShippingAddress,
    pub sku: Sku,
    #[serde(default)]
    pub idempotency_key: Option<IdempotencyKey>,
}

impl CreateOrderRequest {
    fn into_new_order(self) -> NewOrder {
        let order = NewOrder::new(self.quantity, self.shipping_address, self.sku);
        match self.idempotency_key {
            Some(key) => order.with_idempotency_key(key),
            None => order,
        }
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub quantity: i32,
    pub shipping_address: String,
    pub sku: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            quantity: order.quantity.get(),
            shipping_address: order.shipping_address.as_str().to_string(),
            sku: order.sku.to_string(),
            status: order.status.to_string(),
            idempotency_key: order.idempotency_key.map(|k| k.to_string()),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

// -- Handlers --

/// POST /orders: create an order, or replay an earlier creation.
///
/// Answers `201` for a new order and `200` when the idempotency key was
/// already used; both carry the stored order.
#[tracing::instrument(skip(state, deadline, payload))]
pub async fn create<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    deadline: RequestDeadline,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(req) = payload.inspect_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "rejected create order request");
    })?;

    let cmd = CreateOrder::new(req.into_new_order(), deadline.instant());
    let outcome = state.order_service.create_order(cmd).await?;

    let status = match &outcome {
        CreateOrderOutcome::Created(_) => StatusCode::CREATED,
        CreateOrderOutcome::Replayed(_) => StatusCode::OK,
    };

    Ok((status, Json(OrderResponse::from(outcome.into_order()))))
}

/// GET /orders/{id}: load an order by ID.
#[tracing::instrument(skip(state, deadline, id))]
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    deadline: RequestDeadline,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let Path(id) = id?;
    let order_id = parse_order_id(&id)?;

    let order = state
        .order_service
        .get_order(order_id, deadline.instant())
        .await?;

    Ok(Json(OrderResponse::from(order)))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))?;
    Ok(OrderId::from(uuid))
}
