use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::intent::Intent;
use crate::domain::session::{Session, SessionId, Turn};
use crate::handlers::{FallbackHandler, HandoffUpdate, IntentHandler, TurnContext};

/// Chooses an intent for a customer message given the conversation so far.
///
/// Implementations must not fail the turn: anything unrecoverable is
/// reported as [`Intent::Unknown`].
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, message: &str, history: &[Turn]) -> Intent;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("session store failure: {0}")]
pub struct SessionStoreError(pub String);

/// Durable home for sessions between turns.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, SessionStoreError>;
    async fn save(&self, session: &Session) -> Result<(), SessionStoreError>;
    async fn delete(&self, id: &SessionId) -> Result<bool, SessionStoreError>;
    async fn prune_idle(&self, cutoff: DateTime<Utc>) -> Result<u64, SessionStoreError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error(transparent)]
    Store(#[from] SessionStoreError),
}

/// The outcome of one conversation turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReply {
    pub session_id: SessionId,
    pub intent: Intent,
    pub text: String,
}

#[derive(Clone, Copy, Debug)]
pub struct ManagerSettings {
    /// Maximum transcript turns retained when a session is loaded.
    pub max_turns: usize,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self { max_turns: 10 }
    }
}

/// Keeps whole sessions in process memory. Suits tests and single-node
/// setups that can afford to lose transcripts on restart.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.sessions.read().await.get(&id.0).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        self.sessions.write().await.insert(session.id.0.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, SessionStoreError> {
        Ok(self.sessions.write().await.remove(&id.0).is_some())
    }

    async fn prune_idle(&self, cutoff: DateTime<Utc>) -> Result<u64, SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_active_at >= cutoff);
        Ok((before - sessions.len()) as u64)
    }
}

/// Owns the session lifecycle: resolves the session, picks the intent,
/// dispatches to a handler, and persists the updated transcript.
pub struct ConversationManager<S> {
    store: S,
    classifier: Arc<dyn Classifier>,
    handlers: HashMap<Intent, Arc<dyn IntentHandler>>,
    fallback: Arc<dyn IntentHandler>,
    audit: Arc<dyn AuditSink>,
    settings: ManagerSettings,
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S> ConversationManager<S>
where
    S: SessionStore,
{
    pub fn new(
        store: S,
        classifier: Arc<dyn Classifier>,
        handlers: Vec<Arc<dyn IntentHandler>>,
        audit: Arc<dyn AuditSink>,
        settings: ManagerSettings,
    ) -> Self {
        let handlers =
            handlers.into_iter().map(|handler| (handler.intent(), handler)).collect();
        Self {
            store,
            classifier,
            handlers,
            fallback: Arc::new(FallbackHandler),
            audit,
            settings,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Runs one turn for the given session, creating the session when no id
    /// is supplied. Turns for the same session are serialised.
    ///
    /// An active handoff takes precedence over classification: every
    /// message is fed to the handoff flow until it completes or is
    /// cancelled. Blank messages are never classified.
    pub async fn handle_message(
        &self,
        session_id: Option<&str>,
        message: &str,
    ) -> Result<TurnReply, ConversationError> {
        let session_id = match session_id {
            Some(id) if !id.trim().is_empty() => SessionId(id.trim().to_owned()),
            _ => SessionId::generate(),
        };
        let correlation_id = Uuid::new_v4().to_string();
        let context = TurnContext::new(correlation_id.clone());

        let lock = self.session_lock(&session_id).await;
        let _guard = lock.lock().await;

        let mut session = match self.store.load(&session_id).await? {
            Some(session) => session,
            None => Session::new(session_id.clone()),
        };
        session.trim_history(self.settings.max_turns);

        let handoff_was_active = session.handoff.is_some();
        let intent = if handoff_was_active {
            Intent::HumanHandoff
        } else if message.trim().is_empty() {
            Intent::GeneralQuery
        } else {
            self.classifier.classify(message, &session.turns).await
        };

        let handler = self.handlers.get(&intent).unwrap_or(&self.fallback);
        let reply = handler.handle(message, &session, &context).await;

        match reply.handoff {
            Some(HandoffUpdate::Store(progress)) => session.handoff = Some(progress),
            Some(HandoffUpdate::Clear) => session.handoff = None,
            None => {}
        }
        session.active_intent = if intent == Intent::HumanHandoff && session.handoff.is_none() {
            None
        } else {
            Some(intent)
        };

        session.record_user(message);
        session.record_assistant(reply.text.clone());
        self.store.save(&session).await?;

        self.audit.emit(
            AuditEvent::new(
                Some(session_id.clone()),
                correlation_id.clone(),
                "conversation.turn.routed",
                AuditCategory::Routing,
                "conversation-manager",
                AuditOutcome::Success,
            )
            .with_metadata("intent", intent.label()),
        );
        if handoff_was_active && session.handoff.is_none() {
            self.audit.emit(AuditEvent::new(
                Some(session_id.clone()),
                correlation_id.clone(),
                "conversation.handoff.closed",
                AuditCategory::Handoff,
                "conversation-manager",
                AuditOutcome::Success,
            ));
        }
        info!(
            event_name = "conversation.turn.completed",
            session_id = %session_id.0,
            correlation_id = %correlation_id,
            intent = intent.label(),
            "turn completed",
        );

        Ok(TurnReply { session_id, intent, text: reply.text })
    }

    /// Deletes the session outright. Returns whether anything was removed.
    pub async fn reset_session(&self, session_id: &str) -> Result<bool, ConversationError> {
        let id = SessionId(session_id.to_owned());
        let lock = self.session_lock(&id).await;
        let guard = lock.lock().await;
        let removed = self.store.delete(&id).await?;
        drop(guard);

        self.turn_locks.lock().await.remove(&id.0);
        Ok(removed)
    }

    pub async fn session_history(
        &self,
        session_id: &str,
    ) -> Result<Option<Session>, ConversationError> {
        Ok(self.store.load(&SessionId(session_id.to_owned())).await?)
    }

    /// Removes sessions idle for longer than `idle_for` and drops turn
    /// locks nobody is holding any more.
    pub async fn prune_idle(&self, idle_for: Duration) -> Result<u64, ConversationError> {
        let cutoff = Utc::now() - idle_for;
        let removed = self.store.prune_idle(cutoff).await?;

        let mut locks = self.turn_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        drop(locks);

        if removed > 0 {
            info!(event_name = "conversation.sessions.pruned", removed, "idle sessions pruned");
            self.audit.emit(
                AuditEvent::new(
                    None,
                    Uuid::new_v4().to_string(),
                    "conversation.sessions.pruned",
                    AuditCategory::Persistence,
                    "conversation-manager",
                    AuditOutcome::Success,
                )
                .with_metadata("removed", removed.to_string()),
            );
        }
        Ok(removed)
    }

    async fn session_lock(&self, id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        locks.entry(id.0.clone()).or_default().clone()
    }
}
