mod config;
mod dispatcher;
mod error;
mod llm;
mod platform;
mod server;
mod update;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::llm::LlmClient;
use crate::platform::telegram::TelegramMessenger;
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,florence_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Provider: {}", config.llm.provider);
    info!("  Model: {}", config.llm.model);
    info!("  Listen: {}", config.server.listen_addr);

    let messenger = Arc::new(TelegramMessenger::new(&config.telegram)?);

    if let Some(url) = config.telegram.webhook_url.as_deref() {
        if let Err(e) = messenger.register_webhook(url).await {
            warn!("Could not register webhook: {:#}", e);
        }
    }

    let completion = Arc::new(LlmClient::new(config.llm.clone()));
    let dispatcher = Dispatcher::new(messenger, completion, config.replies.clone());
    let state = Arc::new(AppState::new(dispatcher));

    info!("Relay is starting...");
    server::serve(&config.server.listen_addr, state).await?;

    Ok(())
}
