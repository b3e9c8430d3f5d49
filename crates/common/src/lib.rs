//! Identifiers and validated value objects shared by every crate of the
//! orders service.

pub mod types;
pub mod values;

pub use types::{IdempotencyKey, OrderId, Sku};
pub use values::{Quantity, ShippingAddress, ValidationError};
