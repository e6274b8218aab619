//! Base provider trait and common types for Quire
//!
//! This module defines the Provider trait implemented by model backends,
//! along with the message types, generation requests and stream chunks that
//! the orchestrator and tools exchange with it.

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Message structure for conversation
///
/// Represents a message in the conversation with the model provider.
/// Messages can be from the user, assistant, system, or tool results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (user, assistant, system, tool)
    pub role: String,
    /// Content of the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Optional tool calls in the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Optional tool call ID (for tool result messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use quire::providers::Message;
    ///
    /// let msg = Message::user("What is the weather in Paris?");
    /// assert_eq!(msg.role, "user");
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new tool result message
    ///
    /// # Arguments
    ///
    /// * `tool_call_id` - The ID of the tool call this result corresponds to
    /// * `content` - The serialized tool result
    ///
    /// # Examples
    ///
    /// ```
    /// use quire::providers::Message;
    ///
    /// let msg = Message::tool_result("call_123", r#"{"temperature":21.5}"#);
    /// assert_eq!(msg.role, "tool");
    /// assert_eq!(msg.tool_call_id, Some("call_123".to_string()));
    /// ```
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Creates an assistant message carrying tool calls and optional text
    ///
    /// # Arguments
    ///
    /// * `content` - Text the assistant produced before calling tools, if any
    /// * `tool_calls` - The tool calls to include
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }
}

/// Function call information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function/tool to call
    pub name: String,
    /// Arguments for the function (as JSON string)
    pub arguments: String,
}

/// Tool call structure
///
/// Represents a request from the model to execute a tool with specific arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Function call details
    pub function: FunctionCall,
}

impl ToolCall {
    /// Convenience constructor
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Parse the argument string as JSON, treating an empty string as `{}`
    pub fn parsed_arguments(&self) -> Result<serde_json::Value> {
        if self.function.arguments.trim().is_empty() {
            return Ok(serde_json::json!({}));
        }
        Ok(serde_json::from_str(&self.function.arguments)?)
    }
}

/// Token usage information from a completion
///
/// Serialized in the camelCase shape the data stream protocol uses for
/// finish parts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: usize,
    /// Number of tokens in the completion
    pub completion_tokens: usize,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    ///
    /// # Examples
    ///
    /// ```
    /// use quire::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total(), 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    /// Total tokens used (prompt + completion)
    pub fn total(&self) -> usize {
        self.prompt_tokens + self.completion_tokens
    }

    /// Accumulate another step's usage into this one
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// Natural end of output
    Stop,
    /// Output truncated by a token limit
    Length,
    /// Model requested tool calls
    ToolCalls,
    /// Output blocked by the provider's content filter
    ContentFilter,
    /// Generation failed
    Error,
    /// Provider gave a reason we don't recognize
    Unknown,
}

impl FinishReason {
    /// Map an OpenAI `finish_reason` string
    pub fn from_openai(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "tool_calls" | "function_call" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            _ => Self::Unknown,
        }
    }
}

/// Structured output constraint for a generation request
///
/// Sent to the provider as an OpenAI `json_schema` response format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Schema name
    pub name: String,
    /// JSON schema the output must satisfy
    pub schema: serde_json::Value,
}

/// A single generation call against a provider
///
/// Built with [`GenerationRequest::new`] and the `with_*` builder methods.
///
/// # Examples
///
/// ```
/// use quire::providers::{GenerationRequest, Message};
///
/// let request = GenerationRequest::new("gpt-4o-mini", vec![Message::user("hi")])
///     .with_system("You are terse.")
///     .with_temperature(0.2);
/// assert_eq!(request.model, "gpt-4o-mini");
/// assert_eq!(request.system.as_deref(), Some("You are terse."));
/// ```
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Provider-side model identifier
    pub model: String,
    /// System prompt, prepended to the messages
    pub system: Option<String>,
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Tool definitions (OpenAI function format)
    pub tools: Vec<serde_json::Value>,
    /// Structured output schema
    pub response_format: Option<ResponseFormat>,
    /// Predicted output hint (the content being rewritten)
    pub prediction: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    /// Create a request for `model` over `messages`
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }

    /// Set the system prompt
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Offer tools to the model
    pub fn with_tools(mut self, tools: Vec<serde_json::Value>) -> Self {
        self.tools = tools;
        self
    }

    /// Constrain output to a JSON schema
    pub fn with_schema(mut self, name: impl Into<String>, schema: serde_json::Value) -> Self {
        self.response_format = Some(ResponseFormat {
            name: name.into(),
            schema,
        });
        self
    }

    /// Attach a predicted-output hint
    pub fn with_prediction(mut self, content: impl Into<String>) -> Self {
        self.prediction = Some(content.into());
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Messages as sent to the provider: system prompt first, orphan tool
    /// messages removed
    pub fn wire_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        if let Some(system) = &self.system {
            messages.push(Message::system(system.clone()));
        }
        messages.extend(validate_message_sequence(&self.messages));
        messages
    }
}

/// Completion response with message and optional token usage
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The response message from the model
    pub message: Message,
    /// Optional token usage information
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Create a new CompletionResponse
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
        }
    }

    /// Create a new CompletionResponse with token usage
    pub fn with_usage(message: Message, usage: TokenUsage) -> Self {
        Self {
            message,
            usage: Some(usage),
        }
    }

    /// Text content of the response, empty if none
    pub fn text(&self) -> &str {
        self.message.content.as_deref().unwrap_or_default()
    }
}

/// One increment of a streamed generation
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Incremental text
    TextDelta(String),
    /// A fully assembled tool call
    ToolCall(ToolCall),
    /// End of the generation
    Finish {
        /// Why generation stopped
        reason: FinishReason,
        /// Token usage, when the provider reports it
        usage: Option<TokenUsage>,
    },
}

/// Stream of generation chunks
pub type ChunkStream = BoxStream<'static, Result<StreamChunk>>;

/// Provider trait for model backends
///
/// # Examples
///
/// ```no_run
/// use quire::providers::{ChunkStream, CompletionResponse, GenerationRequest, Message, Provider};
/// use quire::error::Result;
/// use async_trait::async_trait;
///
/// struct EchoProvider;
///
/// #[async_trait]
/// impl Provider for EchoProvider {
///     async fn complete(&self, _request: &GenerationRequest) -> Result<CompletionResponse> {
///         Ok(CompletionResponse::new(Message::assistant("echo")))
///     }
///
///     async fn stream(&self, _request: &GenerationRequest) -> Result<ChunkStream> {
///         unimplemented!()
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Run a generation to completion
    ///
    /// # Errors
    ///
    /// Returns error if the API call fails or the response is invalid
    async fn complete(&self, request: &GenerationRequest) -> Result<CompletionResponse>;

    /// Start a streamed generation
    ///
    /// The returned stream yields text deltas and assembled tool calls in the
    /// order the provider produced them, and ends with a `Finish` chunk.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be started; failures after that
    /// surface as `Err` items in the stream
    async fn stream(&self, request: &GenerationRequest) -> Result<ChunkStream>;
}

/// Validates message sequence and removes orphan tool messages
///
/// An orphan tool message is a `tool` message with no `tool_call_id`, or
/// whose id matches no tool call of an earlier assistant message.
/// Providers reject such sequences with 400 errors.
///
/// # Examples
///
/// ```
/// use quire::providers::{Message, validate_message_sequence};
///
/// let messages = vec![
///     Message::user("Do something"),
///     Message::tool_result("call_123", "Result"),
/// ];
/// let validated = validate_message_sequence(&messages);
/// assert_eq!(validated.len(), 1);
/// ```
pub fn validate_message_sequence(messages: &[Message]) -> Vec<Message> {
    use std::collections::HashSet;

    let mut valid_tool_ids: HashSet<&str> = HashSet::new();

    messages
        .iter()
        .filter(|message| {
            if message.role == "assistant" {
                if let Some(tool_calls) = &message.tool_calls {
                    valid_tool_ids.extend(tool_calls.iter().map(|c| c.id.as_str()));
                }
            }

            if message.role != "tool" {
                return true;
            }

            match &message.tool_call_id {
                Some(id) if valid_tool_ids.contains(id.as_str()) => true,
                Some(id) => {
                    tracing::warn!("Dropping orphan tool message with tool_call_id: {}", id);
                    false
                }
                None => {
                    tracing::warn!("Dropping tool message without tool_call_id");
                    false
                }
            }
        })
        .cloned()
        .collect()
}
