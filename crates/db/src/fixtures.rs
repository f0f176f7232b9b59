//! Canonical demo dataset.
//!
//! `SEED_ORDERS` is the contract for what a freshly seeded database
//! contains: one order per interesting fulfillment state, under fixed
//! ids that demo scripts and smoke checks can rely on. Seeding is an
//! upsert, so re-running it refreshes the rows instead of duplicating
//! them.

use chrono::{DateTime, Utc};

use desky_core::domain::order::{OrderId, OrderRecord};

use crate::repositories::{RepositoryError, SqlOrderRepository};
use crate::DbPool;

pub const SEED_ORDERS: &[SeedOrder] = &[
    SeedOrder {
        id: "abc123def456ghi789jkl012mno345p0",
        customer_id: "cust-104",
        status: "delivered",
        purchased_at: Some("2026-02-01T09:30:00Z"),
        approved_at: Some("2026-02-01T10:05:00Z"),
        shipped_at: Some("2026-02-03T16:45:00Z"),
        delivered_at: Some("2026-02-06T13:20:00Z"),
        estimated_delivery_at: Some("2026-02-08T00:00:00Z"),
    },
    SeedOrder {
        id: "7f3b9c1d8e2a4b6c9d0e1f2a3b4c5d6e",
        customer_id: "cust-212",
        status: "shipped",
        purchased_at: Some("2026-02-10T14:00:00Z"),
        approved_at: Some("2026-02-10T14:30:00Z"),
        shipped_at: Some("2026-02-12T08:15:00Z"),
        delivered_at: None,
        estimated_delivery_at: Some("2026-02-17T00:00:00Z"),
    },
    SeedOrder {
        id: "0a1b2c3d4e5f6a7b8c9d0e1f2a3b4c5d",
        customer_id: "cust-308",
        status: "processing",
        purchased_at: Some("2026-02-15T11:45:00Z"),
        approved_at: Some("2026-02-15T12:10:00Z"),
        shipped_at: None,
        delivered_at: None,
        estimated_delivery_at: Some("2026-02-22T00:00:00Z"),
    },
    SeedOrder {
        id: "5e4d3c2b1a0f9e8d7c6b5a4f3e2d1c0b",
        customer_id: "cust-415",
        status: "approved",
        purchased_at: Some("2026-02-18T09:00:00Z"),
        approved_at: Some("2026-02-18T09:40:00Z"),
        shipped_at: None,
        delivered_at: None,
        estimated_delivery_at: Some("2026-02-25T00:00:00Z"),
    },
    SeedOrder {
        id: "9z8y7x6w5v4u3t2s1r0q9p8o7n6m5l4k",
        customer_id: "cust-520",
        status: "canceled",
        purchased_at: Some("2026-02-05T17:30:00Z"),
        approved_at: None,
        shipped_at: None,
        delivered_at: None,
        estimated_delivery_at: None,
    },
];

#[derive(Clone, Copy, Debug)]
pub struct SeedOrder {
    pub id: &'static str,
    pub customer_id: &'static str,
    pub status: &'static str,
    pub purchased_at: Option<&'static str>,
    pub approved_at: Option<&'static str>,
    pub shipped_at: Option<&'static str>,
    pub delivered_at: Option<&'static str>,
    pub estimated_delivery_at: Option<&'static str>,
}

impl SeedOrder {
    pub fn to_record(&self) -> Result<OrderRecord, RepositoryError> {
        Ok(OrderRecord {
            id: OrderId::parse(self.id)
                .map_err(|error| RepositoryError::Decode(format!("seed order id: {error}")))?,
            customer_id: Some(self.customer_id.to_owned()),
            status: self.status.to_owned(),
            purchased_at: parse_seed_timestamp("purchased_at", self.purchased_at)?,
            approved_at: parse_seed_timestamp("approved_at", self.approved_at)?,
            shipped_at: parse_seed_timestamp("shipped_at", self.shipped_at)?,
            delivered_at: parse_seed_timestamp("delivered_at", self.delivered_at)?,
            estimated_delivery_at: parse_seed_timestamp(
                "estimated_delivery_at",
                self.estimated_delivery_at,
            )?,
        })
    }
}

fn parse_seed_timestamp(
    column: &str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|timestamp| timestamp.with_timezone(&Utc))
                .map_err(|error| {
                    RepositoryError::Decode(format!("seed timestamp `{column}`: {error}"))
                })
        })
        .transpose()
}

pub struct SeedSummary {
    pub orders_seeded: usize,
}

pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

pub async fn seed_orders(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
    let repository = SqlOrderRepository::new(pool.clone());
    for seed in SEED_ORDERS {
        let record = seed.to_record()?;
        repository.upsert(&record).await?;
    }
    Ok(SeedSummary { orders_seeded: SEED_ORDERS.len() })
}

/// Checks that every contract order is present with its contract status.
pub async fn verify_orders(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
    let mut checks = Vec::with_capacity(SEED_ORDERS.len());
    for seed in SEED_ORDERS {
        let present = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM orders WHERE id = ? AND status = ?)",
        )
        .bind(seed.id)
        .bind(seed.status)
        .fetch_one(pool)
        .await?;
        checks.push((seed.id, present == 1));
    }

    let all_present = checks.iter().all(|(_, present)| *present);
    Ok(VerificationResult { all_present, checks })
}
