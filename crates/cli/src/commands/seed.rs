use std::fs;
use std::path::Path;

use crate::commands::CommandResult;
use desky_core::config::{AppConfig, LoadOptions};
use desky_core::domain::policy::STARTER_POLICIES_JSON;
use desky_db::{connect_with_settings, fixtures, migrations};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let summary = fixtures::seed_orders(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = fixtures::verify_orders(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<usize, (&'static str, String, u8)> = if !verification.all_present {
            Err(("seed_verification", verification_failure_message(&verification.checks), 6u8))
        } else {
            Ok(summary.orders_seeded)
        };

        pool.close().await;
        run_result
    });

    let orders_seeded = match result {
        Ok(orders_seeded) => orders_seeded,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("seed", error_class, message, exit_code);
        }
    };

    match ensure_policy_catalog(&config.policies.path) {
        Ok(policies_note) => CommandResult::success(
            "seed",
            format!("seeded {orders_seeded} demo orders; {policies_note}"),
        ),
        Err(message) => CommandResult::failure("seed", "policy_catalog", message, 6),
    }
}

fn verification_failure_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks = checks
        .iter()
        .filter_map(|(order_id, present)| (!present).then_some(*order_id))
        .collect::<Vec<_>>();

    if failed_checks.is_empty() {
        "some demo orders failed to load".to_string()
    } else {
        format!("verification failed for orders: {}", failed_checks.join(", "))
    }
}

/// Writes the starter policy catalog to the configured path unless a
/// catalog is already there. An existing file is never overwritten.
fn ensure_policy_catalog(path: &Path) -> Result<String, String> {
    if path.exists() {
        return Ok(format!("policy catalog already present at `{}`", path.display()));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|error| {
                format!("could not create policy directory `{}`: {error}", parent.display())
            })?;
        }
    }

    fs::write(path, STARTER_POLICIES_JSON)
        .map_err(|error| format!("could not write policy catalog `{}`: {error}", path.display()))?;
    Ok(format!("wrote starter policy catalog to `{}`", path.display()))
}
