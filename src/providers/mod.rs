//! Provider module for Quire
//!
//! This module contains the model provider abstraction, the
//! OpenAI-compatible implementation, and helpers for incremental parsing of
//! structured output.

pub mod base;
pub mod openai;
pub mod structured;

pub use base::{
    validate_message_sequence, ChunkStream, CompletionResponse, FinishReason, FunctionCall,
    GenerationRequest, Message, Provider, ResponseFormat, StreamChunk, TokenUsage, ToolCall,
};
pub use openai::OpenAiProvider;

use crate::config::ProviderConfig;
use crate::error::{QuireError, Result};
use std::sync::Arc;

/// Create a provider instance based on configuration
///
/// # Arguments
///
/// * `config` - Provider configuration
///
/// # Returns
///
/// Returns a shared provider instance
///
/// # Errors
///
/// Returns error if provider type is invalid or initialization fails
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
    match config.provider_type.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config.openai.clone())?)),
        other => Err(QuireError::Provider(format!("Unknown provider type: {}", other)).into()),
    }
}
