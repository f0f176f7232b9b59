//! SQLite-backed order lookups for the status handler.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use desky_core::domain::order::{OrderId, OrderRecord};
use desky_core::handlers::{CollaboratorError, OrderDirectory};

use super::{parse_optional_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Inserts the order or refreshes every mutable column when the id
    /// already exists. Used by the seeding path and by store imports.
    pub async fn upsert(&self, order: &OrderRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO orders (
                id,
                customer_id,
                status,
                purchased_at,
                approved_at,
                shipped_at,
                delivered_at,
                estimated_delivery_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                customer_id = excluded.customer_id,
                status = excluded.status,
                purchased_at = excluded.purchased_at,
                approved_at = excluded.approved_at,
                shipped_at = excluded.shipped_at,
                delivered_at = excluded.delivered_at,
                estimated_delivery_at = excluded.estimated_delivery_at",
        )
        .bind(order.id.as_str())
        .bind(order.customer_id.as_deref())
        .bind(&order.status)
        .bind(order.purchased_at.map(|value| value.to_rfc3339()))
        .bind(order.approved_at.map(|value| value.to_rfc3339()))
        .bind(order.shipped_at.map(|value| value.to_rfc3339()))
        .bind(order.delivered_at.map(|value| value.to_rfc3339()))
        .bind(order.estimated_delivery_at.map(|value| value.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch(&self, id: &OrderId) -> Result<Option<OrderRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                id,
                customer_id,
                status,
                purchased_at,
                approved_at,
                shipped_at,
                delivered_at,
                estimated_delivery_at
            FROM orders
            WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(order_from_row).transpose()
    }

    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl OrderDirectory for SqlOrderRepository {
    async fn find_order(&self, id: &OrderId) -> Result<Option<OrderRecord>, CollaboratorError> {
        self.fetch(id).await.map_err(CollaboratorError::from)
    }
}

fn order_from_row(row: SqliteRow) -> Result<OrderRecord, RepositoryError> {
    let raw_id: String = row.try_get("id")?;
    let id = OrderId::parse(&raw_id)
        .map_err(|error| RepositoryError::Decode(format!("stored order id is invalid: {error}")))?;

    Ok(OrderRecord {
        id,
        customer_id: row.try_get("customer_id")?,
        status: row.try_get("status")?,
        purchased_at: parse_optional_timestamp("purchased_at", row.try_get("purchased_at")?)?,
        approved_at: parse_optional_timestamp("approved_at", row.try_get("approved_at")?)?,
        shipped_at: parse_optional_timestamp("shipped_at", row.try_get("shipped_at")?)?,
        delivered_at: parse_optional_timestamp("delivered_at", row.try_get("delivered_at")?)?,
        estimated_delivery_at: parse_optional_timestamp(
            "estimated_delivery_at",
            row.try_get("estimated_delivery_at")?,
        )?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use desky_core::domain::order::{OrderId, OrderRecord};
    use desky_core::handlers::OrderDirectory;

    use super::SqlOrderRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    // A private in-memory database per test. The pool holds a single
    // connection, so every query in the test sees the same database.
    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("in-memory pool");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .expect("valid test timestamp")
    }

    fn sample_order(id: &str, status: &str) -> OrderRecord {
        OrderRecord {
            id: OrderId::parse(id).expect("valid order id"),
            customer_id: Some("cust-104".to_owned()),
            status: status.to_owned(),
            purchased_at: Some(parse_ts("2026-02-01T09:30:00Z")),
            approved_at: Some(parse_ts("2026-02-01T10:00:00Z")),
            shipped_at: None,
            delivered_at: None,
            estimated_delivery_at: Some(parse_ts("2026-02-08T00:00:00Z")),
        }
    }

    #[tokio::test]
    async fn upsert_and_fetch_round_trip() {
        let pool = setup_pool().await;
        let repository = SqlOrderRepository::new(pool.clone());
        let order = sample_order("abc123def456ghi789jkl012mno345p0", "processing");

        repository.upsert(&order).await.expect("upsert");
        let fetched = repository.fetch(&order.id).await.expect("fetch");

        assert_eq!(fetched, Some(order));
        pool.close().await;
    }

    #[tokio::test]
    async fn upsert_refreshes_existing_rows() {
        let pool = setup_pool().await;
        let repository = SqlOrderRepository::new(pool.clone());
        let mut order = sample_order("7f3b9c1d8e2a4b6c9d0e1f2a3b4c5d6e", "processing");

        repository.upsert(&order).await.expect("initial upsert");
        order.status = "shipped".to_owned();
        order.shipped_at = Some(parse_ts("2026-02-03T16:45:00Z"));
        repository.upsert(&order).await.expect("second upsert");

        let fetched = repository.fetch(&order.id).await.expect("fetch");
        assert_eq!(fetched, Some(order));
        assert_eq!(repository.count().await.expect("count"), 1);
        pool.close().await;
    }

    #[tokio::test]
    async fn missing_orders_resolve_to_none() {
        let pool = setup_pool().await;
        let repository = SqlOrderRepository::new(pool.clone());
        let absent = OrderId::parse("0a1b2c3d4e5f6a7b8c9d0e1f2a3b4c5d").expect("valid order id");

        let found = repository.find_order(&absent).await.expect("lookup");

        assert_eq!(found, None);
        pool.close().await;
    }
}
