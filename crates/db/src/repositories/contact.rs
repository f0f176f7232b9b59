//! Persistence for completed human-handoff contact requests.

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use desky_core::domain::contact::ContactRequest;
use desky_core::handlers::{CollaboratorError, ContactSink};

use super::RepositoryError;
use crate::DbPool;

/// A stored contact request, as listed for support operators.
#[derive(Clone, Debug, Serialize)]
pub struct ContactRow {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub requested_at: String,
}

pub struct SqlContactRepository {
    pool: DbPool,
}

impl SqlContactRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, request: &ContactRequest) -> Result<i64, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO contact_requests (full_name, email, phone, notes, requested_at)
            VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&request.full_name)
        .bind(&request.email)
        .bind(request.phone.as_deref())
        .bind(request.notes.as_deref())
        .bind(request.requested_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recently filed requests first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<ContactRow>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, full_name, email, phone, notes, requested_at
            FROM contact_requests
            ORDER BY id DESC
            LIMIT ?",
        )
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(contact_from_row).collect()
    }
}

#[async_trait::async_trait]
impl ContactSink for SqlContactRepository {
    async fn record_contact(&self, request: ContactRequest) -> Result<(), CollaboratorError> {
        self.insert(&request).await.map_err(CollaboratorError::from)?;
        Ok(())
    }
}

fn contact_from_row(row: SqliteRow) -> Result<ContactRow, RepositoryError> {
    Ok(ContactRow {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        notes: row.try_get("notes")?,
        requested_at: row.try_get("requested_at")?,
    })
}
