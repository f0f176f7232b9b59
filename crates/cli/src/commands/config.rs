use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use desky_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let api_key = if config.classifier.api_key.is_some() { "<redacted>" } else { "<unset>" };
    let base_url = config.classifier.base_url.as_deref().unwrap_or("<unset>");
    let policies_path = config.policies.path.display().to_string();

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", &["DESKY_DATABASE_URL"]),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", &["DESKY_DATABASE_MAX_CONNECTIONS"]),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", &["DESKY_DATABASE_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "classifier.model",
        &config.classifier.model,
        source("classifier.model", &["DESKY_CLASSIFIER_MODEL"]),
    ));
    lines.push(render_line(
        "classifier.api_key",
        api_key,
        source("classifier.api_key", &["DESKY_CLASSIFIER_API_KEY"]),
    ));
    lines.push(render_line(
        "classifier.base_url",
        base_url,
        source("classifier.base_url", &["DESKY_CLASSIFIER_BASE_URL"]),
    ));
    lines.push(render_line(
        "classifier.timeout_secs",
        &config.classifier.timeout_secs.to_string(),
        source("classifier.timeout_secs", &["DESKY_CLASSIFIER_TIMEOUT_SECS"]),
    ));
    lines.push(render_line(
        "classifier.max_retries",
        &config.classifier.max_retries.to_string(),
        source("classifier.max_retries", &["DESKY_CLASSIFIER_MAX_RETRIES"]),
    ));

    lines.push(render_line(
        "conversation.max_turns",
        &config.conversation.max_turns.to_string(),
        source("conversation.max_turns", &["DESKY_CONVERSATION_MAX_TURNS"]),
    ));
    lines.push(render_line(
        "conversation.idle_timeout_secs",
        &config.conversation.idle_timeout_secs.to_string(),
        source("conversation.idle_timeout_secs", &["DESKY_CONVERSATION_IDLE_TIMEOUT_SECS"]),
    ));
    lines.push(render_line(
        "conversation.sweep_interval_secs",
        &config.conversation.sweep_interval_secs.to_string(),
        source("conversation.sweep_interval_secs", &["DESKY_CONVERSATION_SWEEP_INTERVAL_SECS"]),
    ));

    lines.push(render_line(
        "policies.path",
        &policies_path,
        source("policies.path", &["DESKY_POLICIES_PATH"]),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", &["DESKY_SERVER_BIND_ADDRESS"]),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", &["DESKY_SERVER_PORT"]),
    ));
    lines.push(render_line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        source("server.health_check_port", &["DESKY_SERVER_HEALTH_CHECK_PORT"]),
    ));
    lines.push(render_line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        source("server.graceful_shutdown_secs", &["DESKY_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["DESKY_LOGGING_LEVEL", "DESKY_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["DESKY_LOGGING_FORMAT", "DESKY_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    if let Some(value) = env::var_os("DESKY_CONFIG_PATH") {
        let explicit = PathBuf::from(value);
        if explicit.exists() {
            return Some(explicit);
        }
    }

    let root = PathBuf::from("desky.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/desky.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
