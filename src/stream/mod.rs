//! Data stream wire format
//!
//! A chat response is a `text/plain` body of newline-terminated parts, each
//! written as `<code>:<json>`. Custom side-channel events (document ids,
//! code deltas, suggestions) travel inside data parts as
//! `{"type": ..., "content": ...}` objects.

pub mod sink;

pub use sink::EventSink;

use crate::error::{QuireError, Result};
use crate::providers::{FinishReason, TokenUsage};
use crate::storage::{DocumentKind, Suggestion};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response header announcing the data stream protocol
pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";

/// Protocol version sent in [`DATA_STREAM_HEADER`]
pub const DATA_STREAM_VERSION: &str = "v1";

/// Custom events carried in data parts
///
/// # Examples
///
/// ```
/// use quire::stream::DataEvent;
///
/// let json = serde_json::to_value(DataEvent::CodeDelta("print(1)".into())).unwrap();
/// assert_eq!(json, serde_json::json!({"type": "code-delta", "content": "print(1)"}));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "kebab-case")]
pub enum DataEvent {
    /// Id of the persisted user message for this turn
    UserMessageId(String),
    /// Id of the document being generated
    Id(String),
    /// Title of the document being generated
    Title(String),
    /// Kind of the document being generated
    Kind(DocumentKind),
    /// Reset the client's document view; carries the title to display
    Clear(String),
    /// Incremental document text
    TextDelta(String),
    /// Complete current code draft
    CodeDelta(String),
    /// A finished writing suggestion
    Suggestion(Suggestion),
    /// Document generation finished
    Finish(String),
}

/// Payload of a tool call part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPart {
    /// Provider-assigned call id
    pub tool_call_id: String,
    /// Name of the invoked tool
    pub tool_name: String,
    /// Parsed arguments
    pub args: Value,
}

/// Payload of a tool result part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultPart {
    /// Call this result answers
    pub tool_call_id: String,
    /// Tool output
    pub result: Value,
}

/// Payload of a finish-step part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishStepPart {
    /// Why the step ended
    pub finish_reason: FinishReason,
    /// Tokens spent in the step
    pub usage: TokenUsage,
    /// Whether the step ended in tool calls whose results feed a further step
    pub is_continued: bool,
}

/// Payload of a finish-message part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishMessagePart {
    /// Why generation ended
    pub finish_reason: FinishReason,
    /// Tokens spent across all steps
    pub usage: TokenUsage,
}

/// Payload of a start-step part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStepPart {
    /// Id of the message the step contributes to
    pub message_id: String,
}

/// One line of the data stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    /// `0` text delta
    Text(String),
    /// `2` data events
    Data(Vec<Value>),
    /// `3` error message
    Error(String),
    /// `8` message annotations
    Annotations(Vec<Value>),
    /// `9` tool call
    ToolCall(ToolCallPart),
    /// `a` tool result
    ToolResult(ToolResultPart),
    /// `e` finish step
    FinishStep(FinishStepPart),
    /// `d` finish message
    FinishMessage(FinishMessagePart),
    /// `f` start step
    StartStep(StartStepPart),
}

impl StreamPart {
    /// Single-character type code
    pub fn code(&self) -> char {
        match self {
            Self::Text(_) => '0',
            Self::Data(_) => '2',
            Self::Error(_) => '3',
            Self::Annotations(_) => '8',
            Self::ToolCall(_) => '9',
            Self::ToolResult(_) => 'a',
            Self::FinishStep(_) => 'e',
            Self::FinishMessage(_) => 'd',
            Self::StartStep(_) => 'f',
        }
    }

    fn payload(&self) -> serde_json::Result<String> {
        match self {
            Self::Text(text) | Self::Error(text) => serde_json::to_string(text),
            Self::Data(values) | Self::Annotations(values) => serde_json::to_string(values),
            Self::ToolCall(part) => serde_json::to_string(part),
            Self::ToolResult(part) => serde_json::to_string(part),
            Self::FinishStep(part) => serde_json::to_string(part),
            Self::FinishMessage(part) => serde_json::to_string(part),
            Self::StartStep(part) => serde_json::to_string(part),
        }
    }

    /// Encode as one protocol line, including the trailing newline
    ///
    /// # Examples
    ///
    /// ```
    /// use quire::stream::StreamPart;
    ///
    /// let line = StreamPart::Text("Hi \"there\"".into()).encode().unwrap();
    /// assert_eq!(line, "0:\"Hi \\\"there\\\"\"\n");
    /// ```
    pub fn encode(&self) -> Result<String> {
        Ok(format!("{}:{}\n", self.code(), self.payload()?))
    }

    /// Decode one protocol line (with or without its newline)
    ///
    /// # Errors
    ///
    /// Returns `QuireError::StreamDecode` for a missing separator, an
    /// unknown code or a payload of the wrong shape
    pub fn decode(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        let (code, payload) = line
            .split_once(':')
            .ok_or_else(|| QuireError::StreamDecode(format!("missing separator in {:?}", line)))?;

        let bad = |e: serde_json::Error| QuireError::StreamDecode(format!("code {}: {}", code, e));

        let part = match code {
            "0" => Self::Text(serde_json::from_str(payload).map_err(bad)?),
            "2" => Self::Data(serde_json::from_str(payload).map_err(bad)?),
            "3" => Self::Error(serde_json::from_str(payload).map_err(bad)?),
            "8" => Self::Annotations(serde_json::from_str(payload).map_err(bad)?),
            "9" => Self::ToolCall(serde_json::from_str(payload).map_err(bad)?),
            "a" => Self::ToolResult(serde_json::from_str(payload).map_err(bad)?),
            "e" => Self::FinishStep(serde_json::from_str(payload).map_err(bad)?),
            "d" => Self::FinishMessage(serde_json::from_str(payload).map_err(bad)?),
            "f" => Self::StartStep(serde_json::from_str(payload).map_err(bad)?),
            other => {
                return Err(QuireError::StreamDecode(format!("unknown part code {}", other)).into())
            }
        };
        Ok(part)
    }

    /// Data events carried by a data part, skipping entries that are not
    /// known events
    pub fn data_events(&self) -> Vec<DataEvent> {
        match self {
            Self::Data(values) => values
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Splits a byte stream into decoded parts
///
/// Bytes may arrive in arbitrary chunks; a part is decoded once its
/// terminating newline has been seen.
#[derive(Debug, Default)]
pub struct PartDecoder {
    buffer: Vec<u8>,
}

impl PartDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes; returns every part completed by them
    ///
    /// # Errors
    ///
    /// Returns the first decoding error; later lines in the same chunk are
    /// discarded
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<StreamPart>> {
        self.buffer.extend_from_slice(bytes);
        let mut parts = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = std::str::from_utf8(&line)
                .map_err(|e| QuireError::StreamDecode(format!("invalid UTF-8: {}", e)))?;
            if text.trim().is_empty() {
                continue;
            }
            parts.push(StreamPart::decode(text)?);
        }

        Ok(parts)
    }

    /// Whether unterminated bytes remain
    pub fn has_pending(&self) -> bool {
        !self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

/// Decode a complete response body
///
/// # Errors
///
/// Returns error if any line fails to decode or the body ends mid-line
pub fn decode_body(body: &str) -> Result<Vec<StreamPart>> {
    let mut decoder = PartDecoder::new();
    let parts = decoder.push(body.as_bytes())?;
    if decoder.has_pending() {
        return Err(QuireError::StreamDecode("body ended mid-line".to_string()).into());
    }
    Ok(parts)
}
