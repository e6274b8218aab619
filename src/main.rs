//! Quire - streaming chat service
//!
#![doc = "Main entry point for the Quire server and management commands."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quire::cli::{Cli, Commands, ModelCommand};
use quire::commands;
use quire::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);
    quire::chat::metrics::init_metrics_exporter();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!("Starting server");
            commands::serve::run_server(config).await
        }
        Commands::Reap => commands::serve::run_reap(&config),
        Commands::Users { command } => commands::users::handle_users(&config, command),
        Commands::Sessions { command } => commands::users::handle_sessions(&config, command),
        Commands::Chats { command } => commands::chats::handle_chats(&config, command),
        Commands::Models { command } => match command {
            ModelCommand::List { json } => commands::models::list_models(&config, json),
        },
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    let default = if verbose { "quire=debug" } else { "quire=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
