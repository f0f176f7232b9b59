use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub classifier: ClassifierConfig,
    pub conversation: ConversationConfig,
    pub policies: PoliciesConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub model: String,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub max_turns: usize,
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PoliciesConfig {
    pub path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub classifier_model: Option<String>,
    pub classifier_api_key: Option<String>,
    pub policies_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://desky.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            classifier: ClassifierConfig {
                model: "gemini-1.5-pro".to_string(),
                api_key: None,
                base_url: None,
                timeout_secs: 10,
                max_retries: 1,
            },
            conversation: ConversationConfig {
                max_turns: 10,
                idle_timeout_secs: 3600,
                sweep_interval_secs: 300,
            },
            policies: PoliciesConfig { path: PathBuf::from("config/policies.json") },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                health_check_port: 8081,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("desky.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(classifier) = patch.classifier {
            if let Some(model) = classifier.model {
                self.classifier.model = model;
            }
            if let Some(api_key_value) = classifier.api_key {
                self.classifier.api_key = Some(secret_value(api_key_value));
            }
            if let Some(base_url) = classifier.base_url {
                self.classifier.base_url = Some(base_url);
            }
            if let Some(timeout_secs) = classifier.timeout_secs {
                self.classifier.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = classifier.max_retries {
                self.classifier.max_retries = max_retries;
            }
        }

        if let Some(conversation) = patch.conversation {
            if let Some(max_turns) = conversation.max_turns {
                self.conversation.max_turns = max_turns;
            }
            if let Some(idle_timeout_secs) = conversation.idle_timeout_secs {
                self.conversation.idle_timeout_secs = idle_timeout_secs;
            }
            if let Some(sweep_interval_secs) = conversation.sweep_interval_secs {
                self.conversation.sweep_interval_secs = sweep_interval_secs;
            }
        }

        if let Some(policies) = patch.policies {
            if let Some(path) = policies.path {
                self.policies.path = path;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DESKY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("DESKY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("DESKY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("DESKY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("DESKY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DESKY_CLASSIFIER_MODEL") {
            self.classifier.model = value;
        }
        if let Some(value) = read_env("DESKY_CLASSIFIER_API_KEY") {
            self.classifier.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("DESKY_CLASSIFIER_BASE_URL") {
            self.classifier.base_url = Some(value);
        }
        if let Some(value) = read_env("DESKY_CLASSIFIER_TIMEOUT_SECS") {
            self.classifier.timeout_secs = parse_u64("DESKY_CLASSIFIER_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("DESKY_CLASSIFIER_MAX_RETRIES") {
            self.classifier.max_retries = parse_u32("DESKY_CLASSIFIER_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("DESKY_CONVERSATION_MAX_TURNS") {
            self.conversation.max_turns = parse_usize("DESKY_CONVERSATION_MAX_TURNS", &value)?;
        }
        if let Some(value) = read_env("DESKY_CONVERSATION_IDLE_TIMEOUT_SECS") {
            self.conversation.idle_timeout_secs =
                parse_u64("DESKY_CONVERSATION_IDLE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("DESKY_CONVERSATION_SWEEP_INTERVAL_SECS") {
            self.conversation.sweep_interval_secs =
                parse_u64("DESKY_CONVERSATION_SWEEP_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("DESKY_POLICIES_PATH") {
            self.policies.path = PathBuf::from(value);
        }

        if let Some(value) = read_env("DESKY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DESKY_SERVER_PORT") {
            self.server.port = parse_u16("DESKY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("DESKY_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("DESKY_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("DESKY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("DESKY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("DESKY_LOGGING_LEVEL").or_else(|| read_env("DESKY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DESKY_LOGGING_FORMAT").or_else(|| read_env("DESKY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(classifier_model) = overrides.classifier_model {
            self.classifier.model = classifier_model;
        }
        if let Some(classifier_api_key) = overrides.classifier_api_key {
            self.classifier.api_key = Some(secret_value(classifier_api_key));
        }
        if let Some(policies_path) = overrides.policies_path {
            self.policies.path = policies_path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_classifier(&self.classifier)?;
        validate_conversation(&self.conversation)?;
        validate_policies(&self.policies)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    if let Some(value) = read_env("DESKY_CONFIG_PATH") {
        let path = PathBuf::from(value);
        return path.exists().then_some(path);
    }

    [PathBuf::from("desky.toml"), PathBuf::from("config/desky.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_classifier(classifier: &ClassifierConfig) -> Result<(), ConfigError> {
    if classifier.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "classifier.model must not be empty".to_string(),
        ));
    }

    let missing_key = classifier
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing_key {
        return Err(ConfigError::Validation(
            "classifier.api_key is required. Set it in the config file or via DESKY_CLASSIFIER_API_KEY".to_string()
        ));
    }

    if classifier.timeout_secs == 0 || classifier.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "classifier.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if let Some(base_url) = &classifier.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "classifier.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    if conversation.max_turns == 0 {
        return Err(ConfigError::Validation(
            "conversation.max_turns must be greater than zero".to_string(),
        ));
    }

    if conversation.idle_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "conversation.idle_timeout_secs must be greater than zero".to_string(),
        ));
    }

    if conversation.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "conversation.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_policies(policies: &PoliciesConfig) -> Result<(), ConfigError> {
    if policies.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "policies.path must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.port == server.health_check_port {
        return Err(ConfigError::Validation(
            "server.port and server.health_check_port must differ".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    classifier: Option<ClassifierPatch>,
    conversation: Option<ConversationPatch>,
    policies: Option<PoliciesPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierPatch {
    model: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    max_turns: Option<usize>,
    idle_timeout_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PoliciesPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
