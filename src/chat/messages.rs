//! Client message shapes and stored message content
//!
//! Incoming conversations arrive as [`UiMessage`]s. Generated output is
//! collected as [`ResponseMessage`]s whose parts are persisted as JSON.

use crate::providers::{Message, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool invocation attached to a client-side assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    /// `call`, `partial-call` or `result`
    pub state: String,
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ToolInvocation {
    /// Whether the invocation was answered
    pub fn has_result(&self) -> bool {
        self.state == "result" && self.result.is_some()
    }
}

/// A message as the client sends it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiMessage {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_invocations: Option<Vec<ToolInvocation>>,
}

impl UiMessage {
    /// A plain user message
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: "user".to_string(),
            content: content.into(),
            tool_invocations: None,
        }
    }
}

/// Most recent user-authored message, if any
pub fn last_user_message(messages: &[UiMessage]) -> Option<&UiMessage> {
    messages.iter().rev().find(|m| m.role == "user")
}

/// Convert client messages to provider messages
///
/// Answered tool invocations become an assistant tool-call message followed
/// by one tool message per result; unanswered ones are dropped. Roles other
/// than user and assistant are ignored.
///
/// # Examples
///
/// ```
/// use quire::chat::messages::{to_provider_messages, UiMessage};
///
/// let messages = to_provider_messages(&[UiMessage::user("1", "hello")]);
/// assert_eq!(messages.len(), 1);
/// assert_eq!(messages[0].role, "user");
/// ```
pub fn to_provider_messages(messages: &[UiMessage]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role.as_str() {
            "user" => out.push(Message::user(message.content.clone())),
            "assistant" => {
                let answered: Vec<&ToolInvocation> = message
                    .tool_invocations
                    .iter()
                    .flatten()
                    .filter(|inv| inv.has_result())
                    .collect();

                if answered.is_empty() {
                    if !message.content.is_empty() {
                        out.push(Message::assistant(message.content.clone()));
                    }
                    continue;
                }

                let calls = answered
                    .iter()
                    .map(|inv| ToolCall::new(&inv.tool_call_id, &inv.tool_name, inv.args.to_string()))
                    .collect();
                let content = (!message.content.is_empty()).then(|| message.content.clone());
                out.push(Message::assistant_with_tools(content, calls));

                for inv in answered {
                    let result = inv.result.clone().unwrap_or(Value::Null);
                    out.push(Message::tool_result(&inv.tool_call_id, result.to_string()));
                }
            }
            other => tracing::debug!("Ignoring message with role {}", other),
        }
    }

    out
}

/// One part of a stored assistant or tool message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    /// Generated text
    Text { text: String },
    /// A tool call issued by the model
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    /// The answer to a tool call
    #[serde(rename_all = "camelCase")]
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        result: Value,
    },
}

/// Role of a generated message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseRole {
    Assistant,
    Tool,
}

impl ResponseRole {
    /// Stored role name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A message produced during one turn, before persistence
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMessage {
    pub role: ResponseRole,
    pub parts: Vec<ContentPart>,
}

impl ResponseMessage {
    /// Empty assistant message
    pub fn assistant() -> Self {
        Self {
            role: ResponseRole::Assistant,
            parts: Vec::new(),
        }
    }

    /// Empty tool message
    pub fn tool() -> Self {
        Self {
            role: ResponseRole::Tool,
            parts: Vec::new(),
        }
    }

    /// Append text, merging with a trailing text part
    pub fn push_text(&mut self, delta: &str) {
        if let Some(ContentPart::Text { text }) = self.parts.last_mut() {
            text.push_str(delta);
        } else {
            self.parts.push(ContentPart::Text {
                text: delta.to_string(),
            });
        }
    }
}

/// Drop unanswered tool calls, empty text and messages left empty
///
/// A tool call counts as answered when some tool message in `messages`
/// carries a result with the same id.
pub fn sanitize_response_messages(messages: Vec<ResponseMessage>) -> Vec<ResponseMessage> {
    let answered: Vec<String> = messages
        .iter()
        .filter(|m| m.role == ResponseRole::Tool)
        .flat_map(|m| m.parts.iter())
        .filter_map(|part| match part {
            ContentPart::ToolResult { tool_call_id, .. } => Some(tool_call_id.clone()),
            _ => None,
        })
        .collect();

    messages
        .into_iter()
        .map(|mut message| {
            if message.role == ResponseRole::Assistant {
                message.parts.retain(|part| match part {
                    ContentPart::ToolCall { tool_call_id, .. } => answered.contains(tool_call_id),
                    ContentPart::Text { text } => !text.is_empty(),
                    ContentPart::ToolResult { .. } => true,
                });
            }
            message
        })
        .filter(|message| !message.parts.is_empty())
        .collect()
}
