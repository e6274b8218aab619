//! Test utilities for Quire
//!
//! Provides a scripted provider, chunk builders, and a ready-made tool
//! context over a temporary database.

use crate::auth::Session;
use crate::config::Config;
use crate::error::{QuireError, Result};
use crate::providers::{
    ChunkStream, CompletionResponse, FinishReason, GenerationRequest, Message, Provider,
    StreamChunk, TokenUsage, ToolCall,
};
use crate::storage::{SqliteStorage, Store};
use crate::stream::{DataEvent, EventSink, StreamPart};
use crate::tools::ToolContext;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

/// One scripted stream; `Err` items become provider errors mid-stream
pub type Script = Vec<std::result::Result<StreamChunk, String>>;

/// Provider that replays queued responses and records every request
#[derive(Default)]
pub struct ScriptedProvider {
    streams: Mutex<VecDeque<Script>>,
    completions: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    /// Provider that answers successive `stream` calls with `streams`
    pub fn with_streams(streams: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            streams: Mutex::new(streams.into()),
            ..Default::default()
        })
    }

    /// Queue the text of the next `complete` call
    pub fn push_completion(&self, text: impl Into<String>) {
        self.completions.lock().unwrap().push_back(Ok(text.into()));
    }

    /// Queue a failing `complete` call
    pub fn push_completion_error(&self, message: impl Into<String>) {
        self.completions
            .lock()
            .unwrap()
            .push_back(Err(message.into()));
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(&self, request: &GenerationRequest) -> Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request.clone());
        match self.completions.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(CompletionResponse::with_usage(
                Message::assistant(text),
                TokenUsage::new(5, 3),
            )),
            Some(Err(message)) => Err(QuireError::Provider(message).into()),
            None => Err(QuireError::Provider("no scripted completion".into()).into()),
        }
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<ChunkStream> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| QuireError::Provider("no scripted stream".into()))?;

        let items: Vec<Result<StreamChunk>> = script
            .into_iter()
            .map(|item| item.map_err(|e| QuireError::Provider(e).into()))
            .collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Text deltas followed by a `stop` finish
pub fn text_chunks(deltas: &[&str]) -> Script {
    let mut script: Script = deltas
        .iter()
        .map(|d| Ok(StreamChunk::TextDelta(d.to_string())))
        .collect();
    script.push(Ok(StreamChunk::Finish {
        reason: FinishReason::Stop,
        usage: Some(TokenUsage::new(10, 4)),
    }));
    script
}

/// `text` cut into deltas of at most `size` characters
pub fn split_chunks(text: &str, size: usize) -> Script {
    let chars: Vec<char> = text.chars().collect();
    let pieces: Vec<String> = chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect();
    let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
    text_chunks(&refs)
}

/// A single tool call followed by a `tool-calls` finish
pub fn tool_call_chunks(id: &str, name: &str, args: serde_json::Value) -> Script {
    vec![
        Ok(StreamChunk::ToolCall(ToolCall::new(id, name, args.to_string()))),
        Ok(StreamChunk::Finish {
            reason: FinishReason::ToolCalls,
            usage: Some(TokenUsage::new(8, 2)),
        }),
    ]
}

/// Tool context over a temporary database with one registered user
///
/// # Panics
///
/// Panics if the temporary database cannot be created
pub fn tool_context(streams: Vec<Script>) -> (ToolContext, UnboundedReceiver<StreamPart>, TempDir) {
    tool_context_with(ScriptedProvider::with_streams(streams))
}

/// Like [`tool_context`], with a caller-held provider
///
/// # Panics
///
/// Panics if the temporary database cannot be created
pub fn tool_context_with(
    provider: Arc<ScriptedProvider>,
) -> (ToolContext, UnboundedReceiver<StreamPart>, TempDir) {
    let dir = TempDir::new().expect("Failed to create temporary directory");
    let store = SqliteStorage::new_with_path(dir.path().join("quire.db"))
        .expect("Failed to open test database");
    let user = store
        .create_user("tester@example.com")
        .expect("Failed to create test user");
    let (sink, rx) = EventSink::channel();

    let ctx = ToolContext {
        sink,
        session: Session::new(user.id),
        provider,
        model: Config::default().models[0].clone(),
        store: Arc::new(store),
    };
    (ctx, rx, dir)
}

/// Data events received so far, in order
pub fn drain_events(rx: &mut UnboundedReceiver<StreamPart>) -> Vec<DataEvent> {
    let mut out = Vec::new();
    while let Ok(part) = rx.try_recv() {
        out.extend(part.data_events());
    }
    out
}

/// Every part received so far
pub fn drain_parts(rx: &mut UnboundedReceiver<StreamPart>) -> Vec<StreamPart> {
    let mut out = Vec::new();
    while let Ok(part) = rx.try_recv() {
        out.push(part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_split_chunks_reassembles() {
        let script = split_chunks("héllo wörld", 3);
        let text: String = script
            .iter()
            .filter_map(|c| match c {
                Ok(StreamChunk::TextDelta(d)) => Some(d.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "héllo wörld");
    }

    #[tokio::test]
    async fn test_scripted_provider_replays_in_order() {
        let provider =
            ScriptedProvider::with_streams(vec![text_chunks(&["a"]), text_chunks(&["b"])]);
        let request = GenerationRequest::new("m", vec![Message::user("hi")]);

        let first: Vec<_> = provider.stream(&request).await.unwrap().collect().await;
        let second: Vec<_> = provider.stream(&request).await.unwrap().collect().await;
        assert!(matches!(first[0], Ok(StreamChunk::TextDelta(ref d)) if d == "a"));
        assert!(matches!(second[0], Ok(StreamChunk::TextDelta(ref d)) if d == "b"));
        assert!(provider.stream(&request).await.is_err());
        assert_eq!(provider.requests().len(), 3);
    }
}
