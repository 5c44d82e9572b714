//! Quizdeck Backend
//!
//! Chat command backend for managing quiz decks, with SQLite persistence.
//! The chat gateway delivers parsed command events as JSON lines on stdin;
//! one response JSON line goes back on stdout per handled event.

mod commands;
mod config;
mod db;
mod errors;
mod models;

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::{CommandEvent, CommandRouter};
use config::Config;
use db::Repository;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging. Responses own stdout, so logs go to stderr.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Quizdeck Backend");
    tracing::info!("Database path: {:?}", config.db_path);

    if config.gateway_token.is_none() {
        tracing::warn!(
            "No gateway token configured (QUIZDECK_GATEWAY_TOKEN). The chat gateway cannot authenticate!"
        );
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Build router
    let router = CommandRouter::new(repo);
    tracing::info!("Registered {} command(s)", router.command_catalog().len());

    run_event_loop(router).await
}

/// Bridge the external gateway: one parsed `CommandEvent` per input line, one
/// response line per handled event. Malformed lines are logged and skipped.
async fn run_event_loop(router: CommandRouter) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: CommandEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!("malformed command event: {}", err);
                continue;
            }
        };

        if let Some(response) = router.dispatch(event).await {
            let mut payload = serde_json::to_vec(&response)?;
            payload.push(b'\n');
            stdout.write_all(&payload).await?;
            stdout.flush().await?;
        }
    }

    tracing::info!("Gateway stream closed, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests;
