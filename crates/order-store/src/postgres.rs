use async_trait::async_trait;
use common::{Quantity, ShippingAddress};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    IdempotencyKey, NewOrder, Order, OrderId, OrderStatus, OrderStoreError, Result, Sku,
    store::OrderStore,
};

/// Name of the unique constraint guarding idempotency keys.
pub const IDEMPOTENCY_KEY_CONSTRAINT: &str = "orders_idempotency_key_key";

const ORDER_COLUMNS: &str =
    "id, quantity, shipping_address, sku, status, idempotency_key, created_at, updated_at";

/// PostgreSQL-backed order store implementation.
///
/// Uniqueness of idempotency keys is delegated entirely to the
/// `orders_idempotency_key_key` constraint; the pool is shared by all
/// request handlers without application-level locking.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let quantity: i32 = row.try_get("quantity")?;
        let shipping_address: String = row.try_get("shipping_address")?;
        let status: String = row.try_get("status")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            quantity: Quantity::new(i64::from(quantity))
                .map_err(|e| OrderStoreError::Corrupt(e.to_string()))?,
            shipping_address: ShippingAddress::new(shipping_address)
                .map_err(|e| OrderStoreError::Corrupt(e.to_string()))?,
            sku: Sku::from_uuid(row.try_get::<Uuid, _>("sku")?),
            status: status.parse::<OrderStatus>().map_err(OrderStoreError::Corrupt)?,
            idempotency_key: row
                .try_get::<Option<Uuid>, _>("idempotency_key")?
                .map(IdempotencyKey::from_uuid),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, order), fields(sku = %order.sku))]
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let key = order.idempotency_key;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (id, quantity, shipping_address, sku, status, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(OrderId::new().as_uuid())
        .bind(order.quantity.get())
        .bind(order.shipping_address.as_str())
        .bind(order.sku.as_uuid())
        .bind(OrderStatus::initial().as_str())
        .bind(key.map(|k| k.as_uuid()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(IDEMPOTENCY_KEY_CONSTRAINT)
                && let Some(key) = key
            {
                return OrderStoreError::UniquenessViolation { key };
            }
            OrderStoreError::Unavailable(e)
        })?;

        Self::row_to_order(row)
    }

    #[tracing::instrument(skip(self))]
    async fn get_by_idempotency_key(&self, key: IdempotencyKey) -> Result<Order> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE idempotency_key = $1"
        ))
        .bind(key.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_order(row),
            None => Err(OrderStoreError::NotFound(format!("idempotency key {key}"))),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn get_by_id(&self, id: OrderId) -> Result<Order> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Self::row_to_order(row),
            None => Err(OrderStoreError::NotFound(format!("order {id}"))),
        }
    }
}
