use thiserror::Error;

/// Errors that end the worker loop.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Every sender was dropped while the worker was still running. The
    /// channel is expected to outlive the worker, so this is abnormal.
    #[error("event channel closed while the worker was running")]
    ChannelClosed,
}

/// A single event failed to process. Logged by the worker, never fatal.
#[derive(Debug, Error)]
#[error("failed to process order {order_id}: {reason}")]
pub struct ProcessError {
    pub order_id: String,
    pub reason: String,
}

impl ProcessError {
    pub fn new(order_id: impl ToString, reason: impl Into<String>) -> Self {
        Self {
            order_id: order_id.to_string(),
            reason: reason.into(),
        }
    }
}
