use async_trait::async_trait;

use crate::{IdempotencyKey, NewOrder, Order, OrderId, Result};

/// Core trait for order store implementations.
///
/// Implementations must enforce idempotency-key uniqueness atomically:
/// when several callers present the same key concurrently, exactly one
/// `create_order` succeeds and all others fail with
/// [`OrderStoreError::UniquenessViolation`](crate::OrderStoreError::UniquenessViolation).
/// Orders without a key are never constrained.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order and returns it with its store-assigned fields
    /// (`id`, `status`, timestamps).
    async fn create_order(&self, order: NewOrder) -> Result<Order>;

    /// Looks up the order that owns an idempotency key.
    ///
    /// Fails with `NotFound` if no order carries the key.
    async fn get_by_idempotency_key(&self, key: IdempotencyKey) -> Result<Order>;

    /// Looks up an order by ID.
    ///
    /// Fails with `NotFound` if the order does not exist.
    async fn get_by_id(&self, id: OrderId) -> Result<Order>;
}
