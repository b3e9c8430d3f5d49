//! Order persistence.
//!
//! The [`OrderStore`] trait is the only way the rest of the service touches
//! stored orders. Both backends enforce the same invariant: an idempotency
//! key is attached to at most one order, and concurrent inserts presenting
//! the same key see exactly one success.

pub mod error;
pub mod memory;
pub mod order;
pub mod postgres;
pub mod store;

pub use common::{IdempotencyKey, OrderId, Sku};
pub use error::{OrderStoreError, Result};
pub use memory::InMemoryOrderStore;
pub use order::{NewOrder, Order, OrderStatus};
pub use postgres::PostgresOrderStore;
pub use store::OrderStore;
