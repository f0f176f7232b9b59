//! SQLite-backed session store.
//!
//! A session row carries the routing state (active intent plus any
//! handoff snapshot) while the transcript lives in `session_turns`,
//! one row per turn, ordered by `turn_index`. Saves replace the whole
//! transcript inside a transaction so a partially written history can
//! never be observed.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use desky_core::domain::intent::Intent;
use desky_core::domain::session::{Session, SessionId, Turn, TurnRole};
use desky_core::handoff::HandoffProgress;
use desky_core::manager::{SessionStore, SessionStoreError};

use super::{parse_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let Some(row) = sqlx::query(
            "SELECT session_id, active_intent, handoff_json, created_at, last_active_at
            FROM sessions
            WHERE session_id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let turn_rows = sqlx::query(
            "SELECT role, content, sent_at
            FROM session_turns
            WHERE session_id = ?
            ORDER BY turn_index ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        let turns = turn_rows
            .into_iter()
            .map(turn_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        session_from_row(row, turns).map(Some)
    }

    async fn store(&self, session: &Session) -> Result<(), RepositoryError> {
        let active_intent = session.active_intent.map(|intent| intent.label());
        let handoff_json = session
            .handoff
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|error| {
                RepositoryError::Decode(format!("handoff state does not serialize: {error}"))
            })?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO sessions (session_id, active_intent, handoff_json, created_at, last_active_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                active_intent = excluded.active_intent,
                handoff_json = excluded.handoff_json,
                last_active_at = excluded.last_active_at",
        )
        .bind(&session.id.0)
        .bind(active_intent)
        .bind(handoff_json.as_deref())
        .bind(session.created_at.to_rfc3339())
        .bind(session.last_active_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM session_turns WHERE session_id = ?")
            .bind(&session.id.0)
            .execute(&mut *tx)
            .await?;

        for (index, turn) in session.turns.iter().enumerate() {
            sqlx::query(
                "INSERT INTO session_turns (session_id, turn_index, role, content, sent_at)
                VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&session.id.0)
            .bind(index as i64)
            .bind(turn.role.as_str())
            .bind(&turn.text)
            .bind(turn.sent_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        // Turn rows go with the session via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_active_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl SessionStore for SqlSessionRepository {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, SessionStoreError> {
        self.fetch(id).await.map_err(SessionStoreError::from)
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        self.store(session).await.map_err(SessionStoreError::from)
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, SessionStoreError> {
        self.remove(id).await.map_err(SessionStoreError::from)
    }

    async fn prune_idle(&self, cutoff: DateTime<Utc>) -> Result<u64, SessionStoreError> {
        self.prune(cutoff).await.map_err(SessionStoreError::from)
    }
}

fn session_from_row(row: SqliteRow, turns: Vec<Turn>) -> Result<Session, RepositoryError> {
    let active_intent = row
        .try_get::<Option<String>, _>("active_intent")?
        .map(|label| {
            Intent::from_label(&label).ok_or_else(|| {
                RepositoryError::Decode(format!("unknown intent label `{label}` in session row"))
            })
        })
        .transpose()?;

    let handoff = row
        .try_get::<Option<String>, _>("handoff_json")?
        .map(|raw| {
            serde_json::from_str::<HandoffProgress>(&raw).map_err(|error| {
                RepositoryError::Decode(format!("invalid handoff snapshot: {error}"))
            })
        })
        .transpose()?;

    Ok(Session {
        id: SessionId(row.try_get("session_id")?),
        turns,
        active_intent,
        handoff,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        last_active_at: parse_timestamp("last_active_at", row.try_get("last_active_at")?)?,
    })
}

fn turn_from_row(row: SqliteRow) -> Result<Turn, RepositoryError> {
    let raw_role: String = row.try_get("role")?;
    let role = TurnRole::parse(&raw_role).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown turn role `{raw_role}` in session row"))
    })?;

    Ok(Turn {
        role,
        text: row.try_get("content")?,
        sent_at: parse_timestamp("sent_at", row.try_get("sent_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use sqlx::Row;

    use desky_core::domain::intent::Intent;
    use desky_core::domain::session::{Session, SessionId};
    use desky_core::handoff::HandoffProgress;
    use desky_core::manager::SessionStore;

    use super::SqlSessionRepository;
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

    fn sample_session(id: &str) -> Session {
        let mut session = Session::new(SessionId(id.to_owned()));
        session.record_user("I want to talk to a person");
        session.record_assistant("Could you share your full name?");
        session.active_intent = Some(Intent::HumanHandoff);
        session.handoff = Some(HandoffProgress::AwaitingEmail {
            full_name: "Dana Alvarez".to_owned(),
        });
        session
    }

    #[tokio::test]
    async fn save_and_load_round_trip_preserves_routing_state() {
        let pool = setup_pool().await;
        let store = SqlSessionRepository::new(pool.clone());
        let session = sample_session("sess-round-trip");

        store.save(&session).await.expect("save");
        let loaded = store.load(&session.id).await.expect("load");

        assert_eq!(loaded, Some(session));
        pool.close().await;
    }

    #[tokio::test]
    async fn resaving_replaces_the_stored_transcript() {
        let pool = setup_pool().await;
        let store = SqlSessionRepository::new(pool.clone());
        let mut session = sample_session("sess-replace");

        store.save(&session).await.expect("first save");
        session.record_user("dana@example.com");
        session.record_assistant("Thanks! What is the best phone number?");
        session.handoff = Some(HandoffProgress::AwaitingPhone {
            full_name: "Dana Alvarez".to_owned(),
            email: "dana@example.com".to_owned(),
        });
        store.save(&session).await.expect("second save");

        let loaded = store.load(&session.id).await.expect("load");
        assert_eq!(loaded, Some(session));
        pool.close().await;
    }

    #[tokio::test]
    async fn delete_cascades_to_turn_rows() {
        let pool = setup_pool().await;
        let store = SqlSessionRepository::new(pool.clone());
        let session = sample_session("sess-delete");

        store.save(&session).await.expect("save");
        assert!(store.delete(&session.id).await.expect("delete"));
        assert_eq!(store.load(&session.id).await.expect("load"), None);

        let orphans = sqlx::query("SELECT COUNT(*) AS count FROM session_turns WHERE session_id = ?")
            .bind(&session.id.0)
            .fetch_one(&pool)
            .await
            .expect("count orphans")
            .get::<i64, _>("count");
        assert_eq!(orphans, 0);

        assert!(!store.delete(&session.id).await.expect("second delete"));
        pool.close().await;
    }

    #[tokio::test]
    async fn prune_removes_only_sessions_idle_past_the_cutoff() {
        let pool = setup_pool().await;
        let store = SqlSessionRepository::new(pool.clone());

        let mut stale = Session::new(SessionId("sess-stale".to_owned()));
        stale.last_active_at = Utc::now() - Duration::hours(3);
        let fresh = sample_session("sess-fresh");

        store.save(&stale).await.expect("save stale");
        store.save(&fresh).await.expect("save fresh");

        let cutoff = Utc::now() - Duration::hours(1);
        let pruned = store.prune_idle(cutoff).await.expect("prune");

        assert_eq!(pruned, 1);
        assert_eq!(store.load(&stale.id).await.expect("load stale"), None);
        assert!(store.load(&fresh.id).await.expect("load fresh").is_some());
        pool.close().await;
    }
}
