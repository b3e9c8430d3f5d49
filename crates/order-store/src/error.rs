use thiserror::Error;

use crate::IdempotencyKey;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    /// Another order already owns this idempotency key.
    #[error("Idempotency key {key} is already in use")]
    UniquenessViolation { key: IdempotencyKey },

    /// No order matched the lookup.
    #[error("Order not found: {0}")]
    NotFound(String),

    /// The backing database failed or could not be reached.
    #[error("Database error: {0}")]
    Unavailable(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row could not be decoded into an order.
    #[error("Corrupt order row: {0}")]
    Corrupt(String),
}

impl OrderStoreError {
    /// True when the failure is a lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, OrderStoreError::NotFound(_))
    }
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, OrderStoreError>;
