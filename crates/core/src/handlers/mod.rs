use async_trait::async_trait;
use thiserror::Error;

use crate::domain::contact::ContactRequest;
use crate::domain::intent::Intent;
use crate::domain::order::{OrderId, OrderRecord};
use crate::domain::session::Session;
use crate::handoff::HandoffProgress;

pub mod human_rep;
pub mod order_status;
pub mod return_policy;

pub use human_rep::HumanRepHandler;
pub use order_status::OrderStatusHandler;
pub use return_policy::ReturnPolicyHandler;

/// Per-turn request context threaded through to handlers for logging.
#[derive(Clone, Debug)]
pub struct TurnContext {
    pub correlation_id: String,
}

impl TurnContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into() }
    }
}

/// Change a handler wants applied to the session's handoff state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandoffUpdate {
    Store(HandoffProgress),
    Clear,
}

/// What a handler produced for one turn: the reply text plus any state it
/// wants carried into the next turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerReply {
    pub text: String,
    pub handoff: Option<HandoffUpdate>,
}

impl HandlerReply {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self { text: text.into(), handoff: None }
    }

    pub fn with_handoff(text: impl Into<String>, update: HandoffUpdate) -> Self {
        Self { text: text.into(), handoff: Some(update) }
    }
}

/// Failure reported by a collaborator a handler depends on. Handlers never
/// surface these to the customer directly; they degrade to an apologetic
/// reply instead.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("collaborator failure: {0}")]
pub struct CollaboratorError(pub String);

/// Looks up orders for the order-status handler.
#[async_trait]
pub trait OrderDirectory: Send + Sync {
    async fn find_order(&self, id: &OrderId) -> Result<Option<OrderRecord>, CollaboratorError>;
}

/// Supplies return policy text for the return-policy handler.
pub trait PolicyCatalog: Send + Sync {
    fn categories(&self) -> Vec<String>;
    fn policy_text(&self, category: Option<&str>) -> Option<String>;
}

/// Records completed handoff requests for human follow-up.
#[async_trait]
pub trait ContactSink: Send + Sync {
    async fn record_contact(&self, request: ContactRequest) -> Result<(), CollaboratorError>;
}

/// Responds to one classified intent.
#[async_trait]
pub trait IntentHandler: Send + Sync {
    fn intent(&self) -> Intent;

    async fn handle(
        &self,
        message: &str,
        session: &Session,
        context: &TurnContext,
    ) -> HandlerReply;
}

/// Catch-all reply used when no specialised handler claims the turn.
pub const FALLBACK_REPLY: &str = "I'm sorry, I'm not sure how to handle that specific request. \
     Can I help with order status, return policies, or connecting you to a human representative?";

#[derive(Clone, Copy, Debug, Default)]
pub struct FallbackHandler;

#[async_trait]
impl IntentHandler for FallbackHandler {
    fn intent(&self) -> Intent {
        Intent::GeneralQuery
    }

    async fn handle(
        &self,
        _message: &str,
        _session: &Session,
        _context: &TurnContext,
    ) -> HandlerReply {
        HandlerReply::text_only(FALLBACK_REPLY)
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::session::{Session, SessionId};

    use super::{FallbackHandler, IntentHandler, TurnContext, FALLBACK_REPLY};

    #[tokio::test]
    async fn fallback_describes_supported_capabilities() {
        let session = Session::new(SessionId("s-1".to_owned()));
        let reply = FallbackHandler
            .handle("what's the meaning of life?", &session, &TurnContext::new("req-1"))
            .await;

        assert_eq!(reply.text, FALLBACK_REPLY);
        assert!(reply.handoff.is_none());
    }
}
