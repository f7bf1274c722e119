//! Arena command-line client
//!
//! Thin host for the session library:
//! 1. Loads config and the on-disk session
//! 2. Builds a `SessionClient` whose invalidator clears the session file
//! 3. Runs one command and prints the result as JSON

mod cli;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use arena_auth::FileStore;
use arena_session::{ClearStore, SessionClient};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;

/// Exit code when the session has expired and the user must log in again.
const EXIT_SESSION_EXPIRED: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Cli::parse();

    let config_path = Config::resolve_path(args.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let store = Arc::new(
        FileStore::load(config.session.store_path.clone())
            .await
            .with_context(|| {
                format!(
                    "failed to open session file {}",
                    config.session.store_path.display()
                )
            })?,
    );
    let http = reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .context("failed to build HTTP client")?;
    let client = SessionClient::new(
        http,
        config.session_config(),
        store.clone(),
        Arc::new(ClearStore::new(store)),
    );

    info!(
        base_url = %client.config().base_url,
        timeout_secs = config.api.timeout_secs,
        "configuration loaded"
    );

    match run(&client, args.command).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) if is_session_expired(&e) => {
            error!("session expired");
            eprintln!("session expired, run `arena login <username>` to sign in again");
            std::process::exit(EXIT_SESSION_EXPIRED);
        }
        Err(e) => Err(e),
    }
}

async fn run(client: &SessionClient, command: Command) -> Result<serde_json::Value> {
    match command {
        Command::Login { username, password } => {
            client
                .login(&serde_json::json!({
                    "username": username,
                    "password": password.expose(),
                }))
                .await?;
            Ok(serde_json::to_value(client.status().await)?)
        }
        Command::Logout => {
            client.logout().await?;
            Ok(serde_json::json!({"signed_in": false}))
        }
        Command::Status => Ok(serde_json::to_value(client.status().await)?),
        Command::Get { path } => render(client.get(&path).await?).await,
        Command::Post { path, body } => render(client.post_json(&path, &body).await?).await,
    }
}

/// Status plus body; the body is embedded as JSON when it parses as JSON.
async fn render(response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status().as_u16();
    let text = response.text().await.context("failed to read response body")?;
    let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
    Ok(serde_json::json!({"status": status, "body": body}))
}

fn is_session_expired(err: &anyhow::Error) -> bool {
    err.downcast_ref::<arena_session::Error>()
        .is_some_and(arena_session::Error::is_session_expired)
}
