//! Ordered event channel shared by the orchestrator and tools

use super::{
    DataEvent, FinishMessagePart, FinishStepPart, StartStepPart, StreamPart, ToolCallPart,
    ToolResultPart,
};
use crate::providers::{FinishReason, TokenUsage};
use serde_json::Value;
use tokio::sync::mpsc;

/// Writer half of a response stream
///
/// Cloning yields another handle to the same channel, so parts written by
/// the orchestrator and by a running tool interleave in the order they are
/// written. Writes after the reader has gone away are dropped: generation
/// and persistence carry on without a client.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<StreamPart>,
}

impl EventSink {
    /// Create a sink and the receiver draining it
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamPart>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Write a raw part
    pub fn send(&self, part: StreamPart) {
        if self.tx.send(part).is_err() {
            tracing::trace!("Stream reader gone, dropping part");
        }
    }

    /// Whether the reader has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Write a custom data event
    pub fn data(&self, event: DataEvent) {
        match serde_json::to_value(&event) {
            Ok(value) => self.send(StreamPart::Data(vec![value])),
            Err(e) => tracing::warn!("Failed to encode data event: {}", e),
        }
    }

    /// Write a text delta
    pub fn text(&self, delta: impl Into<String>) {
        self.send(StreamPart::Text(delta.into()));
    }

    /// Write an error part
    pub fn error(&self, message: impl Into<String>) {
        self.send(StreamPart::Error(message.into()));
    }

    /// Write message annotations
    pub fn annotation(&self, value: Value) {
        self.send(StreamPart::Annotations(vec![value]));
    }

    /// Announce a tool call
    pub fn tool_call(&self, tool_call_id: &str, tool_name: &str, args: Value) {
        self.send(StreamPart::ToolCall(ToolCallPart {
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
            args,
        }));
    }

    /// Report a tool result
    pub fn tool_result(&self, tool_call_id: &str, result: Value) {
        self.send(StreamPart::ToolResult(ToolResultPart {
            tool_call_id: tool_call_id.to_string(),
            result,
        }));
    }

    /// Open a step
    pub fn start_step(&self, message_id: &str) {
        self.send(StreamPart::StartStep(StartStepPart {
            message_id: message_id.to_string(),
        }));
    }

    /// Close a step
    pub fn finish_step(&self, finish_reason: FinishReason, usage: TokenUsage, is_continued: bool) {
        self.send(StreamPart::FinishStep(FinishStepPart {
            finish_reason,
            usage,
            is_continued,
        }));
    }

    /// Close the message; the last part of a response
    pub fn finish_message(&self, finish_reason: FinishReason, usage: TokenUsage) {
        self.send(StreamPart::FinishMessage(FinishMessagePart {
            finish_reason,
            usage,
        }));
    }
}
