use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use desky_cli::commands::{config, contacts, doctor, migrate, seed, sessions, smoke};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(
        &[("DESKY_DATABASE_URL", "sqlite::memory:"), ("DESKY_CLASSIFIER_API_KEY", "test-key")],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 0, "expected successful migrate run");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "ok");
        },
    );
}

#[test]
fn migrate_returns_config_failure_without_api_key() {
    with_env(&[("DESKY_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_writes_the_starter_policy_catalog_once() {
    let policies_path =
        env::temp_dir().join(format!("desky-seed-policies-{}.json", std::process::id()));
    let _ = fs::remove_file(&policies_path);
    let policies_value = policies_path.to_string_lossy().to_string();

    with_env(
        &[
            ("DESKY_DATABASE_URL", "sqlite::memory:"),
            ("DESKY_CLASSIFIER_API_KEY", "test-key"),
            ("DESKY_POLICIES_PATH", policies_value.as_str()),
        ],
        || {
            let first = seed::run();
            assert_eq!(first.exit_code, 0, "expected first seed invocation success");
            let first_payload = parse_payload(&first.output);
            assert_eq!(first_payload["command"], "seed");
            assert_eq!(first_payload["status"], "ok");

            let first_message = first_payload["message"].as_str().unwrap_or("");
            assert!(first_message.contains("seeded 5 demo orders"));
            assert!(first_message.contains("wrote starter policy catalog"));

            let second = seed::run();
            assert_eq!(second.exit_code, 0, "expected second seed invocation success");
            let second_payload = parse_payload(&second.output);
            assert_eq!(second_payload["status"], "ok");

            let second_message = second_payload["message"].as_str().unwrap_or("");
            assert!(second_message.contains("seeded 5 demo orders"));
            assert!(second_message.contains("policy catalog already present"));
        },
    );

    let _ = fs::remove_file(&policies_path);
}

#[test]
fn smoke_returns_success_report_with_valid_env() {
    with_env(
        &[("DESKY_DATABASE_URL", "sqlite::memory:"), ("DESKY_CLASSIFIER_API_KEY", "test-key")],
        || {
            let result = smoke::run();
            assert_eq!(result.exit_code, 0, "expected successful smoke report");

            let payload = parse_payload(last_line(&result.output));
            assert_eq!(payload["command"], "smoke");
            assert_eq!(payload["status"], "pass");

            let checks = payload["checks"].as_array().expect("smoke checks array");
            assert_eq!(checks.len(), 5);
            assert_eq!(checks[4]["name"], "conversation_turn");
            assert_eq!(checks[4]["status"], "pass");
        },
    );
}

#[test]
fn smoke_returns_failure_when_config_invalid() {
    with_env(&[], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 6, "expected smoke failure code");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "fail");
    });
}

#[test]
fn doctor_reports_pass_with_valid_env() {
    with_env(
        &[("DESKY_DATABASE_URL", "sqlite::memory:"), ("DESKY_CLASSIFIER_API_KEY", "test-key")],
        || {
            let output = doctor::run(true);
            let payload = parse_payload(&output);

            assert_eq!(payload["overall_status"], "pass");
            let checks = payload["checks"].as_array().expect("doctor checks array");
            assert_eq!(checks.len(), 4);
            assert!(checks.iter().all(|check| check["status"] == "pass"));
        },
    );
}

#[test]
fn config_redacts_the_classifier_key() {
    with_env(
        &[("DESKY_DATABASE_URL", "sqlite::memory:"), ("DESKY_CLASSIFIER_API_KEY", "test-key")],
        || {
            let output = config::run();

            assert!(output.starts_with("effective config"));
            assert!(output
                .contains("- database.url = sqlite::memory: (source: env (DESKY_DATABASE_URL))"));
            assert!(output.contains(
                "- classifier.api_key = <redacted> (source: env (DESKY_CLASSIFIER_API_KEY))"
            ));
            assert!(output.contains("- logging.format = Compact (source: default)"));
            assert!(!output.contains("test-key"));
        },
    );
}

#[test]
fn sessions_prune_reports_removed_count() {
    with_env(
        &[("DESKY_DATABASE_URL", "sqlite::memory:"), ("DESKY_CLASSIFIER_API_KEY", "test-key")],
        || {
            let result = sessions::prune(Some(60));
            assert_eq!(result.exit_code, 0, "expected successful prune run");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "sessions prune");
            assert_eq!(payload["status"], "ok");

            let message = payload["message"].as_str().unwrap_or("");
            assert!(message.contains("removed 0 sessions idle for more than 60s"));
        },
    );
}

#[test]
fn contacts_list_reports_empty_dataset() {
    with_env(
        &[("DESKY_DATABASE_URL", "sqlite::memory:"), ("DESKY_CLASSIFIER_API_KEY", "test-key")],
        || {
            let result = contacts::list(20);
            assert_eq!(result.exit_code, 0, "expected successful contacts listing");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "contacts list");
            assert_eq!(payload["status"], "ok");
            assert_eq!(payload["message"], "no contact requests recorded");
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "DESKY_DATABASE_URL",
        "DESKY_DATABASE_MAX_CONNECTIONS",
        "DESKY_DATABASE_TIMEOUT_SECS",
        "DESKY_CLASSIFIER_MODEL",
        "DESKY_CLASSIFIER_API_KEY",
        "DESKY_CLASSIFIER_BASE_URL",
        "DESKY_CLASSIFIER_TIMEOUT_SECS",
        "DESKY_CLASSIFIER_MAX_RETRIES",
        "DESKY_CONVERSATION_MAX_TURNS",
        "DESKY_CONVERSATION_IDLE_TIMEOUT_SECS",
        "DESKY_CONVERSATION_SWEEP_INTERVAL_SECS",
        "DESKY_POLICIES_PATH",
        "DESKY_SERVER_BIND_ADDRESS",
        "DESKY_SERVER_PORT",
        "DESKY_SERVER_HEALTH_CHECK_PORT",
        "DESKY_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "DESKY_LOGGING_LEVEL",
        "DESKY_LOGGING_FORMAT",
        "DESKY_LOG_LEVEL",
        "DESKY_LOG_FORMAT",
        "DESKY_CONFIG_PATH",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
