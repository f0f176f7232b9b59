//! Repository layer providing data access over the connection pool.
//!
//! SQL-backed repositories implement the collaborator traits from
//! `desky-core`, so the conversation layer never sees `sqlx` types.
//! In-memory equivalents back tests and demos without a database file.

use chrono::{DateTime, Utc};
use thiserror::Error;

use desky_core::handlers::CollaboratorError;
use desky_core::manager::SessionStoreError;

pub mod contact;
pub mod memory;
pub mod order;
pub mod session;

pub use contact::{ContactRow, SqlContactRepository};
pub use memory::{InMemoryContactRepository, InMemoryOrderRepository};
pub use order::SqlOrderRepository;
pub use session::SqlSessionRepository;

/// Errors surfaced by repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for CollaboratorError {
    fn from(error: RepositoryError) -> Self {
        CollaboratorError(error.to_string())
    }
}

impl From<RepositoryError> for SessionStoreError {
    fn from(error: RepositoryError) -> Self {
        SessionStoreError(error.to_string())
    }
}

/// Timestamps are stored as RFC 3339 text so stale-session pruning can
/// compare them lexicographically inside SQLite.
pub(crate) fn parse_timestamp(
    column: &str,
    value: String,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: {error}"))
        })
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|raw| parse_timestamp(column, raw)).transpose()
}
