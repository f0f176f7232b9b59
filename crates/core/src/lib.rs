pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod handoff;
pub mod manager;

pub use domain::contact::ContactRequest;
pub use domain::intent::Intent;
pub use domain::order::{OrderId, OrderRecord};
pub use domain::policy::{PolicyBook, PolicyCatalogError};
pub use domain::session::{Session, SessionId, Turn, TurnRole};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use handlers::{
    CollaboratorError, ContactSink, FallbackHandler, HandlerReply, HumanRepHandler, IntentHandler,
    OrderDirectory, OrderStatusHandler, PolicyCatalog, ReturnPolicyHandler, TurnContext,
};
pub use handoff::{ContactDetails, HandoffProgress, HandoffSlot, SlotOutcome};
pub use manager::{
    Classifier, ConversationError, ConversationManager, InMemorySessionStore, ManagerSettings,
    SessionStore, SessionStoreError, TurnReply,
};
