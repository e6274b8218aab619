//! `quire serve` and `quire reap`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use crate::chat::ChatService;
use crate::config::Config;
use crate::error::Result;
use crate::providers::create_provider;
use crate::reaper;
use crate::server::{router, AppState};
use crate::storage::{SqliteStorage, Store};
use crate::tools::ToolRegistryBuilder;

/// Open the configured database
///
/// # Errors
///
/// Returns error if the database cannot be opened or migrated
pub fn open_store(config: &Config) -> Result<Arc<SqliteStorage>> {
    Ok(Arc::new(SqliteStorage::new(&config.storage)?))
}

/// Run the HTTP server until Ctrl-C
///
/// Starts the inline-chat reaper alongside the server and stops it on
/// shutdown.
///
/// # Errors
///
/// Returns error if the provider, store or listener cannot be set up
pub async fn run_server(config: Config) -> Result<()> {
    let config = Arc::new(config);
    let store: Arc<dyn Store> = open_store(&config)?;
    let provider = create_provider(&config.provider)?;
    let tools = Arc::new(ToolRegistryBuilder::new(config.tools.clone()).build()?);

    let chat = ChatService::new(Arc::clone(&config), Arc::clone(&store), provider, tools);
    let app = router(AppState::new(chat));

    let shutdown = CancellationToken::new();
    let reaper_handle = reaper::spawn(
        Arc::clone(&store),
        Duration::from_secs(config.inline.reap_interval_seconds),
        shutdown.clone(),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    tracing::info!("Listening on {}", config.server.bind);
    println!("{} {}", "Quire listening on".green(), config.server.bind.cyan());

    let token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            }
            token.cancel();
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(e) = reaper_handle.await {
        tracing::warn!("Reaper task ended abnormally: {}", e);
    }
    tracing::info!("Server stopped");
    Ok(())
}

/// Run one reaper pass and report the count
///
/// # Errors
///
/// Returns error if the database cannot be opened or queried
pub fn run_reap(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let removed = reaper::run_once(&*store)?;
    if removed == 0 {
        println!("{}", "No expired inline chats.".yellow());
    } else {
        println!("{}", format!("Removed {} expired inline chats", removed).green());
    }
    Ok(())
}
