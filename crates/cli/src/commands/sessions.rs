use chrono::Utc;

use crate::commands::CommandResult;
use desky_core::config::{AppConfig, LoadOptions};
use desky_core::SessionStore;
use desky_db::repositories::SqlSessionRepository;
use desky_db::{connect_with_settings, migrations};

// Keeps `Utc::now() - idle` inside the representable date range.
const MAX_IDLE_SECS: u64 = 100 * 365 * 24 * 60 * 60;

pub fn prune(idle_secs: Option<u64>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "sessions prune",
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
                "sessions prune",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let idle_secs = idle_secs.unwrap_or(config.conversation.idle_timeout_secs).min(MAX_IDLE_SECS);
    let cutoff = Utc::now() - chrono::Duration::seconds(idle_secs as i64);

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

        let store = SqlSessionRepository::new(pool.clone());
        let removed = store
            .prune_idle(cutoff)
            .await
            .map_err(|error| ("session_prune", error.to_string(), 6u8))?;

        pool.close().await;
        Ok::<u64, (&'static str, String, u8)>(removed)
    });

    match result {
        Ok(removed) => CommandResult::success(
            "sessions prune",
            format!("removed {removed} sessions idle for more than {idle_secs}s"),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("sessions prune", error_class, message, exit_code)
        }
    }
}
