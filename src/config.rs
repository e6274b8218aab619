//! Configuration management for Quire
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{QuireError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main configuration structure for Quire
///
/// Holds everything the server needs: bind address, provider settings,
/// the catalogue of selectable chat models, and tool/storage/session limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Model provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Chat models a client may select with `modelId`
    #[serde(default = "default_models")]
    pub models: Vec<ChatModel>,

    /// Model id used when a client does not choose one
    #[serde(default = "default_model_id")]
    pub default_model: String,

    /// Model id used for chat title generation
    #[serde(default = "default_model_id")]
    pub title_model: String,

    /// Orchestration settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Persistence settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Inline (ephemeral) chat settings
    #[serde(default)]
    pub inline: InlineConfig,

    /// Session settings
    #[serde(default)]
    pub auth: AuthConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Maximum accepted request body size (bytes)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Provider configuration
///
/// Quire talks to any endpoint implementing the OpenAI chat completions API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// OpenAI-compatible endpoint configuration
    #[serde(default)]
    pub openai: OpenAiConfig,
}

fn default_provider_type() -> String {
    "openai".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            openai: OpenAiConfig::default(),
        }
    }
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API base URL, without the trailing `/chat/completions`
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,

    /// API key; usually supplied through `QUIRE_PROVIDER_API_KEY` or `OPENAI_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout (seconds)
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_provider_timeout() -> u64 {
    120
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: default_openai_api_base(),
            api_key: None,
            timeout_seconds: default_provider_timeout(),
        }
    }
}

/// A selectable chat model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatModel {
    /// Identifier clients send as `modelId`
    pub id: String,
    /// Human readable name
    pub label: String,
    /// Model name sent to the provider
    pub api_identifier: String,
    /// Short description shown in model pickers
    #[serde(default)]
    pub description: String,
}

fn default_models() -> Vec<ChatModel> {
    vec![
        ChatModel {
            id: "gpt-4o-mini".to_string(),
            label: "GPT 4o mini".to_string(),
            api_identifier: "gpt-4o-mini".to_string(),
            description: "Small model for fast, lightweight tasks".to_string(),
        },
        ChatModel {
            id: "gpt-4o".to_string(),
            label: "GPT 4o".to_string(),
            api_identifier: "gpt-4o".to_string(),
            description: "For complex, multi-step tasks".to_string(),
        },
    ]
}

fn default_model_id() -> String {
    "gpt-4o-mini".to_string()
}

/// Orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of model steps (model turn plus tool turns) per request
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

fn default_max_steps() -> usize {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

/// Tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Base URL of the Open-Meteo compatible weather API
    #[serde(default = "default_weather_api_base")]
    pub weather_api_base: String,

    /// Weather request timeout (seconds)
    #[serde(default = "default_weather_timeout")]
    pub weather_timeout_seconds: u64,
}

fn default_weather_api_base() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

fn default_weather_timeout() -> u64 {
    10
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            weather_api_base: default_weather_api_base(),
            weather_timeout_seconds: default_weather_timeout(),
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path; the platform data directory is used when unset
    #[serde(default)]
    pub db_path: Option<String>,
}

/// Inline chat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineConfig {
    /// Lease granted to an inline chat on every submission (seconds)
    #[serde(default = "default_lease_seconds")]
    pub lease_seconds: i64,

    /// Interval between reaper passes while serving (seconds)
    #[serde(default = "default_reap_interval")]
    pub reap_interval_seconds: u64,
}

fn default_lease_seconds() -> i64 {
    900
}

fn default_reap_interval() -> u64 {
    300
}

impl Default for InlineConfig {
    fn default() -> Self {
        Self {
            lease_seconds: default_lease_seconds(),
            reap_interval_seconds: default_reap_interval(),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Default lifetime of issued session tokens (hours)
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: i64,
}

fn default_session_ttl() -> i64 {
    24 * 30
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default_config()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            models: default_models(),
            default_model: default_model_id(),
            title_model: default_model_id(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
            storage: StorageConfig::default(),
            inline: InlineConfig::default(),
            auth: AuthConfig::default(),
        }
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| QuireError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML document
    ///
    /// # Errors
    ///
    /// Returns `QuireError::Config` if the document is not valid configuration
    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| QuireError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(bind) = std::env::var("QUIRE_BIND") {
            self.server.bind = bind;
        }

        if let Ok(db_path) = std::env::var("QUIRE_DB_PATH") {
            self.storage.db_path = Some(db_path);
        }

        if let Ok(api_base) = std::env::var("QUIRE_PROVIDER_API_BASE") {
            self.provider.openai.api_base = api_base;
        }

        if let Ok(api_key) = std::env::var("QUIRE_PROVIDER_API_KEY") {
            self.provider.openai.api_key = Some(api_key);
        } else if self.provider.openai.api_key.is_none() {
            if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
                self.provider.openai.api_key = Some(api_key);
            }
        }

        if let Ok(max_steps) = std::env::var("QUIRE_MAX_STEPS") {
            if let Ok(value) = max_steps.parse() {
                self.agent.max_steps = value;
            } else {
                tracing::warn!("Invalid QUIRE_MAX_STEPS: {}", max_steps);
            }
        }

        if let Ok(weather) = std::env::var("QUIRE_WEATHER_API_BASE") {
            self.tools.weather_api_base = weather;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(db_path) = &cli.db_path {
            self.storage.db_path = Some(db_path.clone());
        }

        if let crate::cli::Commands::Serve {
            bind: Some(bind), ..
        } = &cli.command
        {
            self.server.bind = bind.clone();
        }
    }

    /// Look up a configured chat model by the id clients send
    ///
    /// # Arguments
    ///
    /// * `id` - The `modelId` from the request
    ///
    /// # Returns
    ///
    /// Returns the matching model, or `None` if no model has that id
    pub fn find_model(&self, id: &str) -> Option<&ChatModel> {
        self.models.iter().find(|m| m.id == id)
    }

    /// The model used for title generation
    ///
    /// Falls back to the default model when `title_model` is unknown, which
    /// `validate` otherwise rejects.
    pub fn title_chat_model(&self) -> Option<&ChatModel> {
        self.find_model(&self.title_model)
            .or_else(|| self.find_model(&self.default_model))
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let valid_providers = ["openai"];
        if !valid_providers.contains(&self.provider.provider_type.as_str()) {
            return Err(QuireError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        if self.models.is_empty() {
            return Err(QuireError::Config("At least one model must be configured".to_string()).into());
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if model.id.is_empty() || model.api_identifier.is_empty() {
                return Err(QuireError::Config(
                    "Model id and api_identifier cannot be empty".to_string(),
                )
                .into());
            }
            if !seen.insert(model.id.as_str()) {
                return Err(
                    QuireError::Config(format!("Duplicate model id: {}", model.id)).into(),
                );
            }
        }

        if self.find_model(&self.default_model).is_none() {
            return Err(QuireError::Config(format!(
                "default_model '{}' is not a configured model",
                self.default_model
            ))
            .into());
        }

        if self.find_model(&self.title_model).is_none() {
            return Err(QuireError::Config(format!(
                "title_model '{}' is not a configured model",
                self.title_model
            ))
            .into());
        }

        if self.agent.max_steps == 0 {
            return Err(
                QuireError::Config("agent.max_steps must be greater than 0".to_string()).into(),
            );
        }

        if self.agent.max_steps > 20 {
            return Err(QuireError::Config(
                "agent.max_steps must be less than or equal to 20".to_string(),
            )
            .into());
        }

        if self.provider.openai.timeout_seconds == 0 || self.tools.weather_timeout_seconds == 0 {
            return Err(QuireError::Config("timeouts must be greater than 0".to_string()).into());
        }

        if self.inline.lease_seconds <= 0 {
            return Err(QuireError::Config(
                "inline.lease_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.inline.reap_interval_seconds == 0 {
            return Err(QuireError::Config(
                "inline.reap_interval_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.auth.session_ttl_hours <= 0 {
            return Err(QuireError::Config(
                "auth.session_ttl_hours must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
