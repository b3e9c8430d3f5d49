//! The persisted order entity and its creation input.

use chrono::{DateTime, Utc};
use common::{IdempotencyKey, OrderId, Quantity, ShippingAddress, Sku};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a stored order.
///
/// Every order starts as [`OrderStatus::Pending`]; later states belong to
/// downstream processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// The status assigned at creation.
    pub fn initial() -> Self {
        OrderStatus::Pending
    }

    /// Returns the status as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

/// A stored order.
///
/// `id`, `sku` and `idempotency_key` never change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub quantity: Quantity,
    pub shipping_address: ShippingAddress,
    pub sku: Sku,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<IdempotencyKey>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an order. Built from already-validated values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub quantity: Quantity,
    pub shipping_address: ShippingAddress,
    pub sku: Sku,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl NewOrder {
    /// Creates input for an order without an idempotency key.
    pub fn new(quantity: Quantity, shipping_address: ShippingAddress, sku: Sku) -> Self {
        Self {
            quantity,
            shipping_address,
            sku,
            idempotency_key: None,
        }
    }

    /// Attaches an idempotency key.
    pub fn with_idempotency_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    /// Returns true if `order` carries the same caller-supplied fields.
    pub fn matches(&self, order: &Order) -> bool {
        self.quantity == order.quantity
            && self.shipping_address == order.shipping_address
            && self.sku == order.sku
            && self.idempotency_key == order.idempotency_key
    }
}
