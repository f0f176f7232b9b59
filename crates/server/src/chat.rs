//! Customer chat surface.
//!
//! Serves the chat page and the JSON endpoints it talks to:
//! - `GET /` - chat page
//! - `POST /api/chat` - run one conversation turn
//! - `GET /api/sessions/{id}` - replay a stored transcript
//! - `DELETE /api/sessions/{id}` - clear a session

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use desky_core::errors::{ApplicationError, DomainError, InterfaceError};
use desky_core::manager::{ConversationManager, SessionStore};
use desky_core::{Session, Turn};
use serde::{Deserialize, Serialize};
use tera::Tera;
use tracing::{error, warn};
use uuid::Uuid;

pub struct ChatState<S> {
    manager: Arc<ConversationManager<S>>,
    templates: Arc<Tera>,
}

impl<S> Clone for ChatState<S> {
    fn clone(&self) -> Self {
        Self { manager: Arc::clone(&self.manager), templates: Arc::clone(&self.templates) }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub intent: String,
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct TurnView {
    pub role: &'static str,
    pub text: String,
    pub sent_at: String,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub active_intent: Option<String>,
    pub handoff_active: bool,
    pub turns: Vec<TurnView>,
    pub created_at: String,
    pub last_active_at: String,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub session_id: String,
    pub cleared: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Initialize the Tera engine with the chat page template.
fn init_templates() -> Arc<Tera> {
    let mut tera = match Tera::new("templates/chat/**/*") {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "failed to load chat templates from filesystem, using empty Tera instance");
            Tera::default()
        }
    };

    tera.add_raw_template("index.html", include_str!("../../../templates/chat/index.html")).ok();

    Arc::new(tera)
}

pub fn router<S>(manager: Arc<ConversationManager<S>>) -> Router
where
    S: SessionStore + 'static,
{
    let templates = init_templates();

    Router::new()
        .route("/", get(chat_page::<S>))
        .route("/api/chat", post(post_chat::<S>))
        .route("/api/sessions/{id}", get(get_session::<S>).delete(delete_session::<S>))
        .with_state(ChatState { manager, templates })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn chat_page<S>(
    State(state): State<ChatState<S>>,
) -> Result<Html<String>, (StatusCode, Html<String>)>
where
    S: SessionStore + 'static,
{
    let mut context = tera::Context::new();
    context.insert("service_name", "desky");

    state.templates.render("index.html", &context).map(Html).map_err(|e| {
        error!(error = %e, "failed to render chat page");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html("<h1>desky</h1><p>The chat page failed to render.</p>".to_string()),
        )
    })
}

pub async fn post_chat<S>(
    State(state): State<ChatState<S>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorBody>)>
where
    S: SessionStore + 'static,
{
    let correlation_id = Uuid::new_v4().to_string();

    if request.message.trim().is_empty() {
        return Err(request_error(DomainError::EmptyMessage.into(), correlation_id));
    }

    let reply = state
        .manager
        .handle_message(request.session_id.as_deref(), &request.message)
        .await
        .map_err(|e| request_error(e.into(), correlation_id))?;

    Ok(Json(ChatResponse {
        session_id: reply.session_id.0,
        intent: reply.intent.label().to_string(),
        reply: reply.text,
    }))
}

pub async fn get_session<S>(
    Path(id): Path<String>,
    State(state): State<ChatState<S>>,
) -> Result<Json<SessionView>, (StatusCode, Json<ErrorBody>)>
where
    S: SessionStore + 'static,
{
    let correlation_id = Uuid::new_v4().to_string();

    let session = state
        .manager
        .session_history(&id)
        .await
        .map_err(|e| request_error(e.into(), correlation_id.clone()))?;

    match session {
        Some(session) => Ok(Json(session_view(session))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody { error: "No session found with that id.".to_string(), correlation_id }),
        )),
    }
}

pub async fn delete_session<S>(
    Path(id): Path<String>,
    State(state): State<ChatState<S>>,
) -> Result<Json<ClearResponse>, (StatusCode, Json<ErrorBody>)>
where
    S: SessionStore + 'static,
{
    let correlation_id = Uuid::new_v4().to_string();

    let cleared = state
        .manager
        .reset_session(&id)
        .await
        .map_err(|e| request_error(e.into(), correlation_id))?;

    Ok(Json(ClearResponse { session_id: id, cleared }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn session_view(session: Session) -> SessionView {
    SessionView {
        session_id: session.id.0.clone(),
        active_intent: session.active_intent.map(|intent| intent.label().to_string()),
        handoff_active: session.handoff.is_some(),
        turns: session.turns.iter().map(turn_view).collect(),
        created_at: session.created_at.to_rfc3339(),
        last_active_at: session.last_active_at.to_rfc3339(),
    }
}

fn turn_view(turn: &Turn) -> TurnView {
    TurnView {
        role: turn.role.as_str(),
        text: turn.text.clone(),
        sent_at: turn.sent_at.to_rfc3339(),
    }
}

/// Maps an application failure onto the wire: a user-safe body plus the
/// correlation id, with the internal detail kept in the logs.
fn request_error(
    error: ApplicationError,
    correlation_id: String,
) -> (StatusCode, Json<ErrorBody>) {
    let interface = error.into_interface(correlation_id);
    let (status, correlation_id) = match &interface {
        InterfaceError::BadRequest { correlation_id, .. } => {
            (StatusCode::BAD_REQUEST, correlation_id.clone())
        }
        InterfaceError::ServiceUnavailable { correlation_id, .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, correlation_id.clone())
        }
        InterfaceError::Internal { correlation_id, .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, correlation_id.clone())
        }
    };

    if status.is_server_error() {
        error!(
            event_name = "chat.request.failed",
            correlation_id = %correlation_id,
            error = %interface,
            "chat request failed"
        );
    } else {
        warn!(
            event_name = "chat.request.rejected",
            correlation_id = %correlation_id,
            error = %interface,
            "chat request rejected"
        );
    }

    (status, Json(ErrorBody { error: interface.user_message().to_string(), correlation_id }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::{Path, State};
    use axum::http::{Request, StatusCode};
    use axum::Json;
    use desky_core::audit::TracingAuditSink;
    use desky_core::manager::{Classifier, InMemorySessionStore, ManagerSettings};
    use desky_core::{
        ConversationManager, HumanRepHandler, Intent, IntentHandler, OrderStatusHandler,
        PolicyBook, ReturnPolicyHandler, Turn,
    };
    use desky_db::repositories::{InMemoryContactRepository, InMemoryOrderRepository};
    use tera::Tera;
    use tower::ServiceExt;

    use super::{
        delete_session, get_session, post_chat, router, ChatRequest, ChatState,
    };

    struct ScriptedClassifier(Intent);

    #[async_trait]
    impl Classifier for ScriptedClassifier {
        async fn classify(&self, _message: &str, _history: &[Turn]) -> Intent {
            self.0
        }
    }

    fn test_manager(intent: Intent) -> Arc<ConversationManager<InMemorySessionStore>> {
        let handlers: Vec<Arc<dyn IntentHandler>> = vec![
            Arc::new(OrderStatusHandler::new(InMemoryOrderRepository::default())),
            Arc::new(ReturnPolicyHandler::new(
                PolicyBook::starter().expect("starter catalog"),
            )),
            Arc::new(HumanRepHandler::new(InMemoryContactRepository::default())),
        ];

        Arc::new(ConversationManager::new(
            InMemorySessionStore::default(),
            Arc::new(ScriptedClassifier(intent)),
            handlers,
            Arc::new(TracingAuditSink),
            ManagerSettings::default(),
        ))
    }

    fn state(
        manager: Arc<ConversationManager<InMemorySessionStore>>,
    ) -> State<ChatState<InMemorySessionStore>> {
        let mut tera = Tera::default();
        tera.add_raw_template("index.html", "<html><body>{{ service_name }}</body></html>").ok();

        State(ChatState { manager, templates: Arc::new(tera) })
    }

    #[tokio::test]
    async fn chat_turn_creates_a_session_and_replies() {
        let manager = test_manager(Intent::OrderStatus);

        let Json(response) = post_chat(
            state(manager.clone()),
            Json(ChatRequest { session_id: None, message: "where is my order?".to_string() }),
        )
        .await
        .expect("turn should succeed");

        assert!(!response.session_id.is_empty());
        assert_eq!(response.intent, "check_order_status");
        assert!(response.reply.contains("32-character"));

        let Json(view) = get_session(Path(response.session_id.clone()), state(manager))
            .await
            .expect("session should be stored");
        assert_eq!(view.session_id, response.session_id);
        assert_eq!(view.turns.len(), 2);
        assert_eq!(view.turns[0].role, "user");
        assert_eq!(view.turns[1].role, "assistant");
    }

    #[tokio::test]
    async fn empty_messages_are_rejected_before_reaching_the_conversation() {
        let manager = test_manager(Intent::GeneralQuery);

        let result = post_chat(
            state(manager),
            Json(ChatRequest { session_id: None, message: "   ".to_string() }),
        )
        .await;

        let (status, Json(body)) = result.err().expect("blank message should be rejected");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "The request could not be processed. Check inputs and try again.");
        assert!(!body.correlation_id.is_empty());
    }

    #[tokio::test]
    async fn handoff_keeps_precedence_across_http_turns() {
        let manager = test_manager(Intent::HumanHandoff);

        let Json(first) = post_chat(
            state(manager.clone()),
            Json(ChatRequest {
                session_id: None,
                message: "I want to talk to a person".to_string(),
            }),
        )
        .await
        .expect("first turn should succeed");
        assert!(first.reply.ends_with("could you please provide your full name?"));

        let Json(second) = post_chat(
            state(manager.clone()),
            Json(ChatRequest {
                session_id: Some(first.session_id.clone()),
                message: "Dana Alvarez".to_string(),
            }),
        )
        .await
        .expect("second turn should succeed");
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.intent, "request_human");
        assert!(second.reply.contains("email address"));

        let Json(view) = get_session(Path(first.session_id.clone()), state(manager))
            .await
            .expect("session should be stored");
        assert!(view.handoff_active);
        assert_eq!(view.turns.len(), 4);
    }

    #[tokio::test]
    async fn unknown_sessions_return_not_found() {
        let manager = test_manager(Intent::GeneralQuery);

        let result = get_session(Path("missing-session".to_string()), state(manager)).await;

        let (status, Json(body)) = result.err().expect("lookup should miss");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "No session found with that id.");
    }

    #[tokio::test]
    async fn clearing_a_session_reports_whether_anything_was_removed() {
        let manager = test_manager(Intent::GeneralQuery);

        let Json(response) = post_chat(
            state(manager.clone()),
            Json(ChatRequest { session_id: None, message: "hello".to_string() }),
        )
        .await
        .expect("turn should succeed");

        let Json(first) =
            delete_session(Path(response.session_id.clone()), state(manager.clone()))
                .await
                .expect("delete should succeed");
        assert!(first.cleared);

        let Json(second) = delete_session(Path(response.session_id), state(manager))
            .await
            .expect("repeat delete should succeed");
        assert!(!second.cleared);
    }

    #[tokio::test]
    async fn the_router_serves_the_chat_surface_end_to_end() {
        let app = router(test_manager(Intent::GeneralQuery));

        let page = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("page response");
        assert_eq!(page.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(page.into_body(), usize::MAX).await.expect("page body");
        assert!(String::from_utf8_lossy(&bytes).contains("desky"));

        let chat = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":"hi there"}"#))
                    .expect("request"),
            )
            .await
            .expect("chat response");
        assert_eq!(chat.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(chat.into_body(), usize::MAX).await.expect("chat body");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("chat json");
        let session_id = payload["session_id"].as_str().unwrap_or_default().to_string();
        assert!(!session_id.is_empty());
        assert_eq!(payload["intent"], "general_query");

        let history = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/sessions/{session_id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("history response");
        assert_eq!(history.status(), StatusCode::OK);
        let bytes =
            axum::body::to_bytes(history.into_body(), usize::MAX).await.expect("history body");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("history json");
        assert_eq!(payload["turns"].as_array().map(Vec::len), Some(2));

        let cleared = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/sessions/{session_id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("delete response");
        assert_eq!(cleared.status(), StatusCode::OK);
        let bytes =
            axum::body::to_bytes(cleared.into_body(), usize::MAX).await.expect("delete body");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("delete json");
        assert_eq!(payload["cleared"], true);
    }
}
