//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{IdempotencyKey, OrderId, Quantity, ShippingAddress, Sku};
use order_store::{NewOrder, OrderStatus, OrderStore, OrderStoreError, PostgresOrderStore};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // Same migration path the binary runs at startup
            PostgresOrderStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresOrderStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE orders")
        .execute(&pool)
        .await
        .unwrap();

    PostgresOrderStore::new(pool)
}

fn create_test_order(key: Option<IdempotencyKey>) -> NewOrder {
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

async fn row_count(store: &PostgresOrderStore) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn create_and_fetch_order() {
    let store = get_test_store().await;
    let input = create_test_order(None);

    let order = store.create_order(input.clone()).await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(input.matches(&order));

    let fetched = store.get_by_id(order.id).await.unwrap();
    assert_eq!(fetched.id, order.id);
    assert_eq!(fetched.sku, order.sku);
    assert_eq!(fetched.quantity.get(), 4);
    assert_eq!(fetched.shipping_address.as_str(), "address");
}

#[tokio::test]
async fn duplicate_idempotency_key_is_rejected() {
    let store = get_test_store().await;
    let key = IdempotencyKey::from(Uuid::new_v4());

    let first = store.create_order(create_test_order(Some(key))).await.unwrap();
    let second = store.create_order(create_test_order(Some(key))).await;

    assert!(matches!(
        second,
        Err(OrderStoreError::UniquenessViolation { key: k }) if k == key
    ));

    let owner = store.get_by_idempotency_key(key).await.unwrap();
    assert_eq!(owner.id, first.id);
    assert_eq!(row_count(&store).await, 1);
}

#[tokio::test]
async fn orders_without_key_do_not_collide() {
    let store = get_test_store().await;

    store.create_order(create_test_order(None)).await.unwrap();
    store.create_order(create_test_order(None)).await.unwrap();

    assert_eq!(row_count(&store).await, 2);
}

#[tokio::test]
async fn concurrent_inserts_with_same_key_persist_one_row() {
    let store = get_test_store().await;
    let key = IdempotencyKey::from(Uuid::new_v4());

    let attempts = (0..10).map(|_| store.create_order(create_test_order(Some(key))));
    let results = futures_util::future::join_all(attempts).await;

    let created = results.iter().filter(|r| r.is_ok()).count();
    let violations = results
        .iter()
        .filter(|r| matches!(r, Err(OrderStoreError::UniquenessViolation { .. })))
        .count();

    assert_eq!(created, 1);
    assert_eq!(violations, 9);
    assert_eq!(row_count(&store).await, 1);
}

#[tokio::test]
async fn missing_rows_are_not_found() {
    let store = get_test_store().await;

    let by_id = store.get_by_id(OrderId::new()).await;
    assert!(by_id.unwrap_err().is_not_found());

    let by_key = store
        .get_by_idempotency_key(IdempotencyKey::from(Uuid::new_v4()))
        .await;
    assert!(by_key.unwrap_err().is_not_found());
}

#[tokio::test]
async fn check_constraints_guard_raw_inserts() {
    let store = get_test_store().await;

    let result = sqlx::query(
        "INSERT INTO orders (id, quantity, shipping_address, sku) VALUES ($1, 0, 'address', $2)",
    )
    .bind(Uuid::new_v4())
    .bind(Uuid::new_v4())
    .execute(store.pool())
    .await;

    assert!(result.is_err());
    assert_eq!(row_count(&store).await, 0);
}

#[tokio::test]
async fn migrations_are_recorded_and_rerunnable() {
    let store = get_test_store().await;

    store.run_migrations().await.unwrap();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(applied, 1);
}
