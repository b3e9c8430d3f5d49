//! Domain error types.

use common::OrderId;
use order_store::OrderStoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
///
/// Idempotency conflicts never appear here: they are resolved into a
/// replay by [`OrderService::create_order`](crate::OrderService::create_order).
#[derive(Debug, Error)]
pub enum DomainError {
    /// The requested order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order store failed.
    #[error("Order store error: {0}")]
    Store(#[from] OrderStoreError),

    /// The order store did not answer before the request deadline.
    #[error("Order store did not answer before the request deadline")]
    StoreTimeout,
}
