//! Asynchronous hand-off from the request path to background processing.
//!
//! Request handlers publish [`OrderCreatedEvent`]s into a bounded
//! [`EventSender`]; a single [`Worker`] drains the matching
//! [`EventReceiver`] and runs an injected [`OrderProcessor`] for each event.
//! A [`TraceCarrier`] travels with every event so the worker can link its
//! span back to the request that produced it.

pub mod channel;
pub mod error;
pub mod event;
pub mod processor;
pub mod trace;
pub mod worker;

pub use channel::{
    DEFAULT_CHANNEL_CAPACITY, DropReason, EventReceiver, EventSender, PublishOutcome, Received,
    channel,
};
pub use error::{ProcessError, WorkerError};
pub use event::OrderCreatedEvent;
pub use processor::{OrderProcessor, ProcessOutcome, SimulatedFulfillment};
pub use trace::TraceCarrier;
pub use worker::Worker;
