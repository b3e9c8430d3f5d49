//! Order commands and their outcomes.

use std::time::Duration;

use order_store::{NewOrder, Order};
use tokio::time::Instant;

/// Command to create an order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// Validated creation input.
    pub order: NewOrder,
    /// Point after which the request no longer waits on the event channel.
    pub deadline: Instant,
}

impl CreateOrder {
    /// Creates a command with an absolute deadline.
    pub fn new(order: NewOrder, deadline: Instant) -> Self {
        Self { order, deadline }
    }

    /// Creates a command whose deadline is `timeout` from now.
    pub fn with_timeout(order: NewOrder, timeout: Duration) -> Self {
        Self::new(order, Instant::now() + timeout)
    }
}

/// What `create_order` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOrderOutcome {
    /// A new order was stored and handed to the worker.
    Created(Order),
    /// The idempotency key was already used; this is the stored order.
    Replayed(Order),
}

impl CreateOrderOutcome {
    pub fn order(&self) -> &Order {
        match self {
            CreateOrderOutcome::Created(order) | CreateOrderOutcome::Replayed(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            CreateOrderOutcome::Created(order) | CreateOrderOutcome::Replayed(order) => order,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, CreateOrderOutcome::Created(_))
    }
}
