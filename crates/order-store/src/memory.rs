use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    IdempotencyKey, NewOrder, Order, OrderId, OrderStatus, OrderStoreError, Result,
    store::OrderStore,
};

#[derive(Default)]
struct Tables {
    orders: HashMap<OrderId, Order>,
    // Unique index over idempotency keys.
    by_key: HashMap<IdempotencyKey, OrderId>,
}

/// In-memory order store implementation.
///
/// The key check and the insert happen under the same write lock, which
/// gives the same all-or-nothing uniqueness guarantee as the PostgreSQL
/// constraint.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let mut tables = self.tables.write().await;

        if let Some(key) = order.idempotency_key
            && tables.by_key.contains_key(&key)
        {
            return Err(OrderStoreError::UniquenessViolation { key });
        }

        let now = Utc::now();
        let stored = Order {
            id: OrderId::new(),
            quantity: order.quantity,
            shipping_address: order.shipping_address,
            sku: order.sku,
            status: OrderStatus::initial(),
            idempotency_key: order.idempotency_key,
            created_at: now,
            updated_at: now,
        };

        if let Some(key) = stored.idempotency_key {
            tables.by_key.insert(key, stored.id);
        }
        tables.orders.insert(stored.id, stored.clone());

        Ok(stored)
    }

    async fn get_by_idempotency_key(&self, key: IdempotencyKey) -> Result<Order> {
        let tables = self.tables.read().await;
        tables
            .by_key
            .get(&key)
            .and_then(|id| tables.orders.get(id))
            .cloned()
            .ok_or_else(|| OrderStoreError::NotFound(format!("idempotency key {key}")))
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Order> {
        let tables = self.tables.read().await;
        tables
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| OrderStoreError::NotFound(format!("order {id}")))
    }
}
