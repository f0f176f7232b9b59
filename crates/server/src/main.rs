mod bootstrap;
mod chat;
mod health;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use desky_core::config::{AppConfig, ConversationConfig, LoadOptions};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

fn init_logging(config: &AppConfig) {
    use desky_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    // Now bootstrap using the same config we already loaded
    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    spawn_idle_sweeper(app.manager.clone(), &app.config.conversation);

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    let chat_router = chat::router(app.manager.clone());

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, chat_router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "desky-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(event_name = "system.server.stopping", "desky-server stopping");

    let _ = shutdown_tx.send(());
    let drain_window = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(drain_window, server).await {
        Ok(served) => served??,
        Err(_) => {
            tracing::warn!(
                event_name = "system.server.drain_timeout",
                "open connections did not drain before the shutdown deadline"
            );
        }
    }

    app.db_pool.close().await;
    Ok(())
}

/// Clears idle sessions on a fixed cadence so abandoned conversations do
/// not accumulate in the store.
fn spawn_idle_sweeper(manager: Arc<bootstrap::ChatManager>, conversation: &ConversationConfig) {
    let idle_for = chrono::Duration::seconds(conversation.idle_timeout_secs as i64);
    let period = Duration::from_secs(conversation.sweep_interval_secs.max(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(error) = manager.prune_idle(idle_for).await {
                tracing::warn!(
                    event_name = "conversation.sweep.failed",
                    error = %error,
                    "idle session sweep failed"
                );
            }
        }
    });
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
