//! Domain layer for the orders service.
//!
//! This crate provides the order creation protocol:
//! - idempotent creation against an [`OrderStore`](order_store::OrderStore)
//! - replay resolution when an idempotency key is reused
//! - best-effort, deadline-bounded hand-off of created orders to the worker

pub mod error;
pub mod order;

pub use error::DomainError;
pub use order::{CreateOrder, CreateOrderOutcome, OrderService};
