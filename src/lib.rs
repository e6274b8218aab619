//! Quire - streaming chat service library
//!
//! Quire accepts a conversation over HTTP, lets a language model answer it
//! while calling tools, and streams the answer back as a line-oriented data
//! stream. Documents drafted by the tools and the conversations themselves
//! are persisted in SQLite.
//!
//! # Architecture
//!
//! - `server`: HTTP routes and shared state
//! - `chat`: request validation, the multi-step orchestration loop, titles
//! - `stream`: the data stream protocol (encoder, decoder, event sink)
//! - `tools`: weather lookup and the document tools
//! - `providers`: model provider abstraction and the OpenAI implementation
//! - `storage`: persistence of users, sessions, chats, messages, documents
//! - `auth`: session tokens
//! - `inline`: client for disposable inline conversations
//! - `reaper`: removal of abandoned inline chats
//! - `config`, `error`, `cli`, `commands`: the ambient pieces
//!
//! # Example
//!
//! ```no_run
//! use quire::Config;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod inline;
pub mod prompts;
pub mod providers;
pub mod reaper;
pub mod server;
pub mod storage;
pub mod stream;
pub mod tools;

// Re-export commonly used types
pub use config::Config;
pub use error::{QuireError, Result};
pub use inline::InlineChat;
pub use server::{router, AppState};

#[cfg(test)]
pub mod test_utils;
