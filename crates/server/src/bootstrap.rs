use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use desky_agent::{GeminiClient, IntentClassifier};
use desky_core::audit::TracingAuditSink;
use desky_core::config::{AppConfig, ConfigError, LoadOptions};
use desky_core::{
    ConversationManager, HumanRepHandler, IntentHandler, ManagerSettings, OrderStatusHandler,
    PolicyBook, PolicyCatalogError, ReturnPolicyHandler,
};
use desky_db::repositories::{SqlContactRepository, SqlOrderRepository, SqlSessionRepository};
use desky_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::{info, warn};

/// The concrete manager the server routes every chat turn through.
pub type ChatManager = ConversationManager<SqlSessionRepository>;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub manager: Arc<ChatManager>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("policy catalog failed to load: {0}")]
    Policies(#[from] PolicyCatalogError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");
    config.validate()?;

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let policies = load_policies(&config.policies.path)?;
    let manager = Arc::new(build_manager(&config, &db_pool, policies)?);
    info!(event_name = "system.bootstrap.conversation_ready", "conversation manager assembled");

    Ok(Application { config, db_pool, manager })
}

/// Loads the return policy catalog, falling back to the built-in starter
/// catalog when the configured file does not exist yet.
fn load_policies(path: &Path) -> Result<PolicyBook, PolicyCatalogError> {
    if path.exists() {
        let policies = PolicyBook::load(path)?;
        info!(
            event_name = "system.bootstrap.policies_loaded",
            path = %path.display(),
            "return policy catalog loaded"
        );
        Ok(policies)
    } else {
        warn!(
            event_name = "system.bootstrap.policies_missing",
            path = %path.display(),
            "policy catalog file not found, using the starter catalog"
        );
        PolicyBook::starter()
    }
}

fn build_manager(
    config: &AppConfig,
    db_pool: &DbPool,
    policies: PolicyBook,
) -> Result<ChatManager, BootstrapError> {
    let api_key = config.classifier.api_key.clone().ok_or_else(|| {
        BootstrapError::Config(ConfigError::Validation(
            "classifier.api_key is required. Set it in the config file or via DESKY_CLASSIFIER_API_KEY".to_string(),
        ))
    })?;

    let mut llm = GeminiClient::new(
        api_key,
        config.classifier.model.clone(),
        Duration::from_secs(config.classifier.timeout_secs),
    );
    if let Some(base_url) = &config.classifier.base_url {
        llm = llm.with_base_url(base_url.clone());
    }
    let classifier = IntentClassifier::new(llm, config.classifier.max_retries);

    let handlers: Vec<Arc<dyn IntentHandler>> = vec![
        Arc::new(OrderStatusHandler::new(SqlOrderRepository::new(db_pool.clone()))),
        Arc::new(ReturnPolicyHandler::new(policies)),
        Arc::new(HumanRepHandler::new(SqlContactRepository::new(db_pool.clone()))),
    ];

    Ok(ConversationManager::new(
        SqlSessionRepository::new(db_pool.clone()),
        Arc::new(classifier),
        handlers,
        Arc::new(TracingAuditSink),
        ManagerSettings { max_turns: config.conversation.max_turns },
    ))
}

#[cfg(test)]
mod tests {
    use desky_core::config::{ConfigOverrides, LoadOptions};
    use desky_core::Intent;

    use crate::bootstrap::{bootstrap, load_policies};

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                classifier_api_key: Some("test-key".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_a_usable_classifier_key() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                classifier_api_key: Some("   ".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().map(|error| error.to_string()).unwrap_or_default();
        assert!(message.contains("classifier.api_key"));
    }

    #[test]
    fn missing_policy_file_falls_back_to_the_starter_catalog() {
        let book = load_policies(std::path::Path::new("does/not/exist/policies.json"))
            .expect("starter catalog should load");

        let categories = book.categories();
        assert!(!categories.is_empty());
        assert!(book.policy_text(None).is_some());
    }

    #[tokio::test]
    async fn integration_smoke_covers_startup_and_the_persisted_chat_path() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('orders', 'sessions', 'session_turns', 'contact_requests')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected baseline tables to be available after bootstrap");
        assert_eq!(table_count, 4, "bootstrap should expose the baseline chat-path tables");

        // A blank message routes to the fallback without consulting the
        // classifier, so the smoke test stays offline.
        let reply = app
            .manager
            .handle_message(None, "   ")
            .await
            .expect("turn should complete against the bootstrapped store");
        assert_eq!(reply.intent, Intent::GeneralQuery);
        assert!(!reply.text.is_empty());

        let stored = app
            .manager
            .session_history(&reply.session_id.0)
            .await
            .expect("history lookup should succeed")
            .expect("the turn should have been persisted");
        assert_eq!(stored.turns.len(), 2);

        let (session_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(&app.db_pool)
            .await
            .expect("count sessions");
        assert_eq!(session_count, 1);

        app.db_pool.close().await;
    }
}
