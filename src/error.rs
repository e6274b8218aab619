//! Error types for Quire
//!
//! This module defines the error types used throughout the service,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Quire operations
///
/// Covers configuration loading, provider interactions, tool execution,
/// storage access and session handling. HTTP-facing errors are mapped
/// separately in [`crate::server::ApiError`].
#[derive(Error, Debug)]
pub enum QuireError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (API calls, stream decoding, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool execution errors
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Persistence errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Session and credential errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Malformed data stream part
    #[error("Stream decoding error: {0}")]
    StreamDecode(String),

    /// Missing credentials for provider
    #[error("Missing credentials for provider: {0}")]
    MissingCredentials(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Quire operations
///
/// Uses `anyhow::Error` so call sites can attach context while still
/// downcasting to [`QuireError`] where the variant matters.
pub type Result<T> = anyhow::Result<T>;
