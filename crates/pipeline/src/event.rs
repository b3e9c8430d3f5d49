use order_store::Order;
use serde::{Deserialize, Serialize};

use crate::trace::TraceCarrier;

/// Hand-off message for a newly created order.
///
/// Owns a snapshot of the order as it was returned by the store. Never
/// produced for idempotent replays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
    pub trace: TraceCarrier,
}

impl OrderCreatedEvent {
    pub fn new(order: Order, trace: TraceCarrier) -> Self {
        Self { order, trace }
    }
}
