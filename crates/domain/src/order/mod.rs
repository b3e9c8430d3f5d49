//! Order creation and lookup.

mod commands;
mod service;

pub use commands::{CreateOrder, CreateOrderOutcome};
pub use service::OrderService;
