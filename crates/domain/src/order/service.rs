//! Order service: the idempotent creation protocol.

use common::OrderId;
use order_store::{Order, OrderStore, OrderStoreError};
use pipeline::{DropReason, EventSender, OrderCreatedEvent, PublishOutcome, TraceCarrier};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::DomainError;

use super::{CreateOrder, CreateOrderOutcome};

/// Service for creating and loading orders.
///
/// Wraps the store and the producer half of the event channel. Only the
/// branch that inserts a new row publishes an event, so replays can never
/// publish twice.
pub struct OrderService<S: OrderStore> {
    store: S,
    events: EventSender<OrderCreatedEvent>,
    shutdown: CancellationToken,
}

impl<S: OrderStore> OrderService<S> {
    /// Creates a new order service.
    ///
    /// `shutdown` is the process-wide token; a publish still waiting for
    /// channel space when it fires is abandoned.
    pub fn new(
        store: S,
        events: EventSender<OrderCreatedEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            events,
            shutdown,
        }
    }

    /// Creates an order, or returns the existing one when the idempotency
    /// key was already used.
    ///
    /// Store calls are bounded by `cmd.deadline`. Once the insert has
    /// returned, the outcome is always reported: the event is published on
    /// a best-effort basis within what is left of the deadline, and a
    /// dropped event never fails the call because the order is already
    /// stored.
    #[tracing::instrument(
        skip(self, cmd),
        fields(sku = %cmd.order.sku, has_idempotency_key = cmd.order.idempotency_key.is_some())
    )]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<CreateOrderOutcome, DomainError> {
        let CreateOrder { order, deadline } = cmd;

        match before_deadline(deadline, self.store.create_order(order.clone())).await? {
            Ok(created) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(order_id = %created.id, "order created");
                self.emit_order_created(&created, deadline).await;
                Ok(CreateOrderOutcome::Created(created))
            }
            Err(OrderStoreError::UniquenessViolation { key }) => {
                let lookup = self.store.get_by_idempotency_key(key);
                let existing = before_deadline(deadline, lookup).await?.map_err(|e| {
                    tracing::error!(
                        error = %e,
                        idempotency_key = %key,
                        "failed to load order by idempotency key after uniqueness violation"
                    );
                    DomainError::Store(e)
                })?;

                metrics::counter!("orders_replayed_total").increment(1);
                // Replays are trusted as retries; differing bodies are only reported.
                if !order.matches(&existing) {
                    metrics::counter!("orders_replay_mismatch_total").increment(1);
                    tracing::warn!(
                        order_id = %existing.id,
                        idempotency_key = %key,
                        "replayed request differs from the stored order"
                    );
                }
                tracing::info!(order_id = %existing.id, "idempotent replay");
                Ok(CreateOrderOutcome::Replayed(existing))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to create order");
                Err(DomainError::Store(e))
            }
        }
    }

    /// Loads an order by ID, giving the store until `deadline` to answer.
    #[tracing::instrument(skip(self, deadline))]
    pub async fn get_order(
        &self,
        order_id: OrderId,
        deadline: Instant,
    ) -> Result<Order, DomainError> {
        let found = before_deadline(deadline, self.store.get_by_id(order_id)).await?;
        found.map_err(|e| {
            if e.is_not_found() {
                DomainError::OrderNotFound(order_id)
            } else {
                tracing::error!(error = %e, %order_id, "failed to load order");
                DomainError::Store(e)
            }
        })
    }

    async fn emit_order_created(&self, order: &Order, deadline: Instant) {
        let span = tracing::info_span!("emit_order_created_event", order_id = %order.id);
        let event = OrderCreatedEvent::new(order.clone(), TraceCarrier::from_span(&span));

        let outcome = self
            .events
            .publish(event, deadline, &self.shutdown)
            .instrument(span.clone())
            .await;

        match outcome {
            PublishOutcome::Enqueued => {
                metrics::counter!("order_events_published_total").increment(1);
                tracing::info!(parent: &span, "order created event emitted");
            }
            PublishOutcome::Dropped(reason) => {
                metrics::counter!("order_events_dropped_total", "reason" => reason.as_str())
                    .increment(1);
                if reason == DropReason::ChannelClosed {
                    tracing::error!(parent: &span, %reason, "order created event dropped");
                } else {
                    tracing::warn!(parent: &span, %reason, "order created event dropped");
                }
            }
        }
    }
}

/// Runs a store call, giving up with [`DomainError::StoreTimeout`] once
/// `deadline` passes.
async fn before_deadline<T, F>(
    deadline: Instant,
    call: F,
) -> Result<order_store::Result<T>, DomainError>
where
    F: Future<Output = order_store::Result<T>>,
{
    tokio::time::timeout_at(deadline, call).await.map_err(|_| {
        metrics::counter!("order_store_timeouts_total").increment(1);
        tracing::error!("order store did not answer before the request deadline");
        DomainError::StoreTimeout
    })
}
