//! Command-line interface definition for Quire
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for running the server and managing its data.

use clap::{Parser, Subcommand};

/// Quire - streaming chat service
///
/// Serves the chat API and provides management commands for users,
/// sessions and stored conversations.
#[derive(Parser, Debug, Clone)]
#[command(name = "quire")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the SQLite database path
    #[arg(long)]
    pub db_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Quire
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to bind, e.g. 127.0.0.1:3000
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Delete inline chats whose lease has expired
    Reap,

    /// Manage users
    Users {
        /// User management subcommand
        #[command(subcommand)]
        command: UserCommand,
    },

    /// Manage session tokens
    Sessions {
        /// Session management subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Inspect stored chats
    Chats {
        /// Chat inspection subcommand
        #[command(subcommand)]
        command: ChatsCommand,
    },

    /// Inspect configured chat models
    Models {
        /// Model subcommand
        #[command(subcommand)]
        command: ModelCommand,
    },
}

/// User management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// Create a user
    Create {
        /// Email address identifying the user
        #[arg(short, long)]
        email: String,
    },
}

/// Session management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// Issue a bearer token for an existing user
    Issue {
        /// Email address of the user
        #[arg(short, long)]
        email: String,

        /// Token lifetime in hours (defaults to auth.session_ttl_hours)
        #[arg(long)]
        ttl_hours: Option<i64>,
    },
}

/// Chat inspection subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ChatsCommand {
    /// List chats owned by a user
    List {
        /// Email address of the user
        #[arg(short, long)]
        email: String,

        /// Include inline (ephemeral) chats
        #[arg(long)]
        all: bool,
    },
}

/// Model subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ModelCommand {
    /// List configured chat models
    List {
        /// Output JSON instead of a table
        #[arg(short, long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            db_path: None,
            command: Commands::Serve { bind: None },
        }
    }
}
