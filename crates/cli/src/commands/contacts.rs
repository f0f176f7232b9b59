use crate::commands::CommandResult;
use desky_core::config::{AppConfig, LoadOptions};
use desky_db::repositories::{ContactRow, SqlContactRepository};
use desky_db::{connect_with_settings, migrations};

pub fn list(limit: i64) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "contacts list",
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
                "contacts list",
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

        let repository = SqlContactRepository::new(pool.clone());
        let rows = repository
            .recent(limit)
            .await
            .map_err(|error| ("contact_list", error.to_string(), 6u8))?;

        pool.close().await;
        Ok::<Vec<ContactRow>, (&'static str, String, u8)>(rows)
    });

    match result {
        Ok(rows) => CommandResult::success("contacts list", render_rows(&rows)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("contacts list", error_class, message, exit_code)
        }
    }
}

fn render_rows(rows: &[ContactRow]) -> String {
    if rows.is_empty() {
        return "no contact requests recorded".to_string();
    }

    let mut lines = vec![format!("{} contact requests, newest first:", rows.len())];
    for row in rows {
        let phone = row.phone.as_deref().unwrap_or("-");
        let mut line = format!(
            "  - #{} {} {} <{}> phone {}",
            row.id, row.requested_at, row.full_name, row.email, phone
        );
        if let Some(notes) = &row.notes {
            line.push_str(&format!(" ({notes})"));
        }
        lines.push(line);
    }

    lines.join("\n")
}
