use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::intent::Intent;
use crate::handoff::HandoffProgress;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<TurnRole> {
        match value {
            "user" => Some(TurnRole::User),
            "assistant" => Some(TurnRole::Assistant),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// A single customer conversation: its transcript plus the routing state
/// carried between turns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub turns: Vec<Turn>,
    pub active_intent: Option<Intent>,
    pub handoff: Option<HandoffProgress>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            turns: Vec::new(),
            active_intent: None,
            handoff: None,
            created_at: now,
            last_active_at: now,
        }
    }

    pub fn record_user(&mut self, text: impl Into<String>) {
        self.record(TurnRole::User, text.into());
    }

    pub fn record_assistant(&mut self, text: impl Into<String>) {
        self.record(TurnRole::Assistant, text.into());
    }

    fn record(&mut self, role: TurnRole, text: String) {
        let now = Utc::now();
        self.turns.push(Turn { role, text, sent_at: now });
        self.last_active_at = now;
    }

    /// Drops the oldest turns so at most `keep` remain.
    pub fn trim_history(&mut self, keep: usize) {
        let excess = self.turns.len().saturating_sub(keep);
        if excess > 0 {
            self.turns.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{Session, SessionId, TurnRole};

    #[test]
    fn generated_ids_are_well_formed() {
        let id = SessionId::generate();
        assert!(Uuid::parse_str(&id.0).is_ok());
    }

    #[test]
    fn recording_turns_updates_last_active() {
        let mut session = Session::new(SessionId("s-1".to_owned()));
        let created_at = session.created_at;

        session.record_user("where is my order?");
        session.record_assistant("let me check that for you");

        assert_eq!(session.turns.len(), 2);
        assert_eq!(session.turns[0].role, TurnRole::User);
        assert_eq!(session.turns[1].role, TurnRole::Assistant);
        assert!(session.last_active_at >= created_at);
    }

    #[test]
    fn trim_history_keeps_most_recent_turns() {
        let mut session = Session::new(SessionId("s-2".to_owned()));
        for index in 0..12 {
            session.record_user(format!("message {index}"));
        }

        session.trim_history(10);

        assert_eq!(session.turns.len(), 10);
        assert_eq!(session.turns[0].text, "message 2");
        assert_eq!(session.turns[9].text, "message 11");

        session.trim_history(10);
        assert_eq!(session.turns.len(), 10);
    }

    #[test]
    fn role_labels_round_trip() {
        assert_eq!(TurnRole::parse(TurnRole::User.as_str()), Some(TurnRole::User));
        assert_eq!(TurnRole::parse(TurnRole::Assistant.as_str()), Some(TurnRole::Assistant));
        assert_eq!(TurnRole::parse("system"), None);
    }
}
