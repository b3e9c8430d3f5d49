//! Background consumer of the order-created channel.

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::channel::{EventReceiver, Received};
use crate::error::WorkerError;
use crate::event::OrderCreatedEvent;
use crate::processor::{OrderProcessor, ProcessOutcome};

/// Drains the event channel and runs the processor for each event.
///
/// The worker is either running or stopped; `run` consumes it, so a stopped
/// worker cannot be restarted.
pub struct Worker<P> {
    events: EventReceiver<OrderCreatedEvent>,
    processor: P,
}

impl<P: OrderProcessor> Worker<P> {
    pub fn new(events: EventReceiver<OrderCreatedEvent>, processor: P) -> Self {
        Self { events, processor }
    }

    /// Runs until `shutdown` is cancelled (returns `Ok`) or the channel
    /// closes (returns [`WorkerError::ChannelClosed`]).
    ///
    /// Cancellation is checked before every dequeue, so no event is taken
    /// off the channel once shutdown has been observed. An event already
    /// being processed sees the same token and may finish or bail out.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), WorkerError> {
        tracing::info!(buffered = self.events.len(), "worker starting");

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    tracing::info!(pending = self.events.len(), "worker stopping due to cancellation");
                    return Ok(());
                }
                received = self.events.recv() => match received {
                    Received::Event(event) => self.handle(event, &shutdown).await,
                    Received::Closed => {
                        tracing::error!("event channel closed while worker was running");
                        return Err(WorkerError::ChannelClosed);
                    }
                    Received::WouldBlock => continue,
                },
            }
        }
    }

    async fn handle(&self, event: OrderCreatedEvent, shutdown: &CancellationToken) {
        let span = tracing::info_span!(
            "process_order_event",
            order_id = %event.order.id,
            sku = %event.order.sku,
        );
        let linked = event.trace.link_to(&span);
        tracing::info!(parent: &span, linked, "processing order event");

        let started = Instant::now();
        let result = self
            .processor
            .process(&event, shutdown)
            .instrument(span.clone())
            .await;

        let outcome = match result {
            Ok(outcome) => {
                match outcome {
                    ProcessOutcome::Completed => tracing::info!(parent: &span, "order processed"),
                    ProcessOutcome::Cancelled => {
                        tracing::info!(parent: &span, "order processing cut short by shutdown")
                    }
                }
                outcome.as_str()
            }
            Err(e) => {
                tracing::error!(parent: &span, error = %e, "failed to process order event");
                "failed"
            }
        };

        metrics::counter!("worker_events_processed_total", "outcome" => outcome).increment(1);
        metrics::histogram!("worker_process_duration_seconds")
            .record(started.elapsed().as_secs_f64());
    }
}
