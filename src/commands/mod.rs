//! Command handlers for the CLI
//!
//! - `serve` runs the HTTP server (and `reap` a single cleanup pass)
//! - `users` creates users and issues session tokens
//! - `chats` lists stored conversations
//! - `models` lists configured chat models

pub mod chats;
pub mod models;
pub mod serve;
pub mod users;
