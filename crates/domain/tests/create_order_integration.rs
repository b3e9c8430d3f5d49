//! Integration tests for the idempotent creation protocol.
//!
//! These tests verify replay handling, concurrent creation with a shared
//! idempotency key, and the backpressure policy of the event hand-off.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{IdempotencyKey, OrderId, Quantity, ShippingAddress, Sku};
use domain::{CreateOrder, CreateOrderOutcome, DomainError, OrderService};
use order_store::{
    InMemoryOrderStore, NewOrder, Order, OrderStore, OrderStoreError,
};
use pipeline::{EventReceiver, OrderCreatedEvent, Received, TraceCarrier, channel};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn new_order(key: Option<IdempotencyKey>) -> NewOrder {
    let order = NewOrder::new(
        Quantity::new(4).unwrap(),
        ShippingAddress::new("address").unwrap(),
        Sku::from(Uuid::parse_str("3deb76e4-cd89-4aa3-b143-89e9c0ed11ad").unwrap()),
    );
    match key {
        Some(key) => order.with_idempotency_key(key),
        None => order,
    }
}

fn command(order: NewOrder) -> CreateOrder {
    CreateOrder::with_timeout(order, Duration::from_secs(1))
}

/// In-memory store whose calls take a fixed time to answer.
#[derive(Clone)]
struct SlowStore {
    inner: InMemoryOrderStore,
    delay: Duration,
}

impl SlowStore {
    fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryOrderStore::new(),
            delay,
        }
    }
}

#[async_trait]
impl OrderStore for SlowStore {
    async fn create_order(&self, order: NewOrder) -> order_store::Result<Order> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_order(order).await
    }

    async fn get_by_idempotency_key(&self, key: IdempotencyKey) -> order_store::Result<Order> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_by_idempotency_key(key).await
    }

    async fn get_by_id(&self, id: OrderId) -> order_store::Result<Order> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_by_id(id).await
    }
}

fn drain(rx: &mut EventReceiver<OrderCreatedEvent>) -> Vec<OrderCreatedEvent> {
    let mut events = Vec::new();
    while let Received::Event(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

mod idempotency {
    use super::*;

    #[tokio::test]
    async fn repeated_requests_reference_the_same_order() {
        let store = InMemoryOrderStore::new();
        let (tx, mut rx) = channel(16);
        let service = OrderService::new(store.clone(), tx, CancellationToken::new());
        let key = IdempotencyKey::from(Uuid::new_v4());

        let mut outcomes = Vec::new();
        for _ in 0..5 {
            outcomes.push(
                service
                    .create_order(command(new_order(Some(key))))
                    .await
                    .unwrap(),
            );
        }

        let created = outcomes.iter().filter(|o| o.is_created()).count();
        assert_eq!(created, 1);
        assert!(outcomes[0].is_created());

        let id = outcomes[0].order().id;
        assert!(outcomes.iter().all(|o| o.order().id == id));
        assert_eq!(store.order_count().await, 1);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn concurrent_requests_create_exactly_one_order() {
        let store = InMemoryOrderStore::new();
        let (tx, mut rx) = channel(64);
        let service = Arc::new(OrderService::new(
            store.clone(),
            tx,
            CancellationToken::new(),
        ));
        let key = IdempotencyKey::from(Uuid::new_v4());

        let attempts = (0..24).map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.create_order(command(new_order(Some(key)))).await })
        });
        let outcomes: Vec<_> = futures_util::future::join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let created: Vec<_> = outcomes.iter().filter(|o| o.is_created()).collect();
        assert_eq!(created.len(), 1);

        let id = created[0].order().id;
        assert!(outcomes.iter().all(|o| o.order().id == id));
        assert_eq!(store.order_count().await, 1);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].order.id, id);
    }

    #[tokio::test]
    async fn requests_without_key_always_create() {
        let store = InMemoryOrderStore::new();
        let (tx, mut rx) = channel(16);
        let service = OrderService::new(store.clone(), tx, CancellationToken::new());

        let a = service.create_order(command(new_order(None))).await.unwrap();
        let b = service.create_order(command(new_order(None))).await.unwrap();

        assert!(a.is_created() && b.is_created());
        assert_ne!(a.order().id, b.order().id);
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[tokio::test]
    async fn replay_with_different_body_returns_the_stored_order() {
        let (tx, _rx) = channel(16);
        let service = OrderService::new(InMemoryOrderStore::new(), tx, CancellationToken::new());
        let key = IdempotencyKey::from(Uuid::new_v4());

        let first = service
            .create_order(command(new_order(Some(key))))
            .await
            .unwrap();

        let mut changed = new_order(Some(key));
        changed.quantity = Quantity::new(9).unwrap();
        let replay = service.create_order(command(changed)).await.unwrap();

        assert!(matches!(replay, CreateOrderOutcome::Replayed(_)));
        assert_eq!(replay.order(), first.order());
        assert_eq!(replay.order().quantity.get(), 4);
    }
}

mod backpressure {
    use super::*;

    #[tokio::test]
    async fn full_channel_does_not_fail_or_stall_creation() {
        let store = InMemoryOrderStore::new();
        let (tx, mut rx) = channel(1);
        let service = OrderService::new(store.clone(), tx, CancellationToken::new());

        service.create_order(command(new_order(None))).await.unwrap();

        let started = Instant::now();
        let outcome = service
            .create_order(CreateOrder::with_timeout(
                new_order(None),
                Duration::from_millis(50),
            ))
            .await
            .unwrap();

        assert!(outcome.is_created());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(store.order_count().await, 2);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_ne!(events[0].order.id, outcome.order().id);
    }

    #[tokio::test]
    async fn slow_insert_within_deadline_is_still_reported_as_created() {
        let store = SlowStore::new(Duration::from_millis(80));
        let (tx, mut rx) = channel(1);
        let service = OrderService::new(store.clone(), tx, CancellationToken::new());
        service.create_order(command(new_order(None))).await.unwrap();

        // The insert eats most of the budget and the channel is full, so the
        // publish gives up at the deadline; the created order is still returned.
        let outcome = service
            .create_order(CreateOrder::with_timeout(
                new_order(None),
                Duration::from_millis(150),
            ))
            .await
            .unwrap();

        assert!(outcome.is_created());
        assert_eq!(store.inner.order_count().await, 2);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn shutdown_drops_the_event_but_keeps_the_order() {
        let store = InMemoryOrderStore::new();
        let (tx, mut rx) = channel(4);
        let shutdown = CancellationToken::new();
        let service = OrderService::new(store.clone(), tx, shutdown.clone());
        shutdown.cancel();

        let outcome = service.create_order(command(new_order(None))).await.unwrap();

        assert!(outcome.is_created());
        assert_eq!(store.order_count().await, 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn published_event_carries_trace_carrier() {
        let (tx, mut rx) = channel(4);
        let service = OrderService::new(InMemoryOrderStore::new(), tx, CancellationToken::new());

        service.create_order(command(new_order(None))).await.unwrap();

        let events = drain(&mut rx);
        // No OpenTelemetry layer is installed in tests, so the carrier is empty.
        assert_eq!(events[0].trace, TraceCarrier::default());
    }
}

mod store_failures {
    use super::*;

    /// Store whose writes fail, optionally also failing the replay lookup.
    struct BrokenStore {
        conflict: bool,
    }

    #[async_trait]
    impl OrderStore for BrokenStore {
        async fn create_order(&self, order: NewOrder) -> order_store::Result<Order> {
            match (self.conflict, order.idempotency_key) {
                (true, Some(key)) => Err(OrderStoreError::UniquenessViolation { key }),
                _ => Err(OrderStoreError::Corrupt("disk on fire".to_string())),
            }
        }

        async fn get_by_idempotency_key(&self, _key: IdempotencyKey) -> order_store::Result<Order> {
            Err(OrderStoreError::Corrupt("disk on fire".to_string()))
        }

        async fn get_by_id(&self, _id: OrderId) -> order_store::Result<Order> {
            Err(OrderStoreError::Corrupt("disk on fire".to_string()))
        }
    }

    #[tokio::test]
    async fn store_error_is_surfaced_without_publishing() {
        let (tx, mut rx) = channel(4);
        let service = OrderService::new(
            BrokenStore { conflict: false },
            tx,
            CancellationToken::new(),
        );

        let result = service.create_order(command(new_order(None))).await;

        assert!(matches!(result, Err(DomainError::Store(_))));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn failed_replay_lookup_is_a_store_error() {
        let (tx, mut rx) = channel(4);
        let service = OrderService::new(
            BrokenStore { conflict: true },
            tx,
            CancellationToken::new(),
        );
        let key = IdempotencyKey::from(Uuid::new_v4());

        let result = service.create_order(command(new_order(Some(key)))).await;

        assert!(matches!(result, Err(DomainError::Store(_))));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn lookup_failure_other_than_miss_is_not_a_not_found() {
        let (tx, _rx) = channel(4);
        let service = OrderService::new(
            BrokenStore { conflict: false },
            tx,
            CancellationToken::new(),
        );

        let deadline = Instant::now() + Duration::from_secs(1);

        let result = service.get_order(OrderId::new(), deadline).await;

        assert!(matches!(result, Err(DomainError::Store(_))));
    }
}

mod deadlines {
    use super::*;

    #[tokio::test]
    async fn stalled_insert_times_out_without_publishing() {
        let store = SlowStore::new(Duration::from_secs(10));
        let (tx, mut rx) = channel(4);
        let service = OrderService::new(store.clone(), tx, CancellationToken::new());

        let started = Instant::now();
        let result = service
            .create_order(CreateOrder::with_timeout(
                new_order(None),
                Duration::from_millis(50),
            ))
            .await;

        assert!(matches!(result, Err(DomainError::StoreTimeout)));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn stalled_lookup_times_out() {
        let (tx, _rx) = channel(4);
        let service = OrderService::new(
            SlowStore::new(Duration::from_secs(10)),
            tx,
            CancellationToken::new(),
        );

        let deadline = Instant::now() + Duration::from_millis(50);
        let result = service.get_order(OrderId::new(), deadline).await;

        assert!(matches!(result, Err(DomainError::StoreTimeout)));
    }
}
