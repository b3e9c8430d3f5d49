//! The unit of work the worker runs for each event.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ProcessError;
use crate::event::OrderCreatedEvent;

/// How a processing attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed,
    /// Cut short by shutdown.
    Cancelled,
}

impl ProcessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessOutcome::Completed => "completed",
            ProcessOutcome::Cancelled => "cancelled",
        }
    }
}

/// Processing strategy injected into the [`Worker`](crate::Worker).
///
/// Implementations should return [`ProcessOutcome::Cancelled`] promptly once
/// `shutdown` fires. Errors are logged by the worker and never stop it.
#[async_trait]
pub trait OrderProcessor: Send + Sync {
    async fn process(
        &self,
        event: &OrderCreatedEvent,
        shutdown: &CancellationToken,
    ) -> Result<ProcessOutcome, ProcessError>;
}

/// Stand-in for real fulfillment: waits a fixed delay per order.
#[derive(Debug, Clone)]
pub struct SimulatedFulfillment {
    delay: Duration,
}

impl SimulatedFulfillment {
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for SimulatedFulfillment {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

#[async_trait]
impl OrderProcessor for SimulatedFulfillment {
    async fn process(
        &self,
        event: &OrderCreatedEvent,
        shutdown: &CancellationToken,
    ) -> Result<ProcessOutcome, ProcessError> {
        tracing::debug!(order_id = %event.order.id, delay_ms = self.delay.as_millis() as u64, "simulating fulfillment");

        tokio::select! {
            () = shutdown.cancelled() => Ok(ProcessOutcome::Cancelled),
            () = tokio::time::sleep(self.delay) => Ok(ProcessOutcome::Completed),
        }
    }
}
