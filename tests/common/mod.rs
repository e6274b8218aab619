use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use quire::auth::issue_session;
use quire::chat::ChatService;
use quire::config::Config;
use quire::providers::{
    ChunkStream, CompletionResponse, FinishReason, GenerationRequest, Message, Provider,
    StreamChunk, TokenUsage, ToolCall,
};
use quire::storage::{SqliteStorage, Store};
use quire::stream::{decode_body, StreamPart};
use quire::tools::ToolRegistryBuilder;
use quire::{router, AppState};

/// Provider replaying canned streams; `complete` answers title requests
#[derive(Default)]
pub struct CannedProvider {
    streams: Mutex<VecDeque<Vec<StreamChunk>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

#[allow(dead_code)]
impl CannedProvider {
    pub fn new(streams: Vec<Vec<StreamChunk>>) -> Arc<Self> {
        Arc::new(Self {
            streams: Mutex::new(streams.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn stream_requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for CannedProvider {
    async fn complete(&self, _request: &GenerationRequest) -> quire::Result<CompletionResponse> {
        Ok(CompletionResponse::new(Message::assistant("\"Canned title\"")))
    }

    async fn stream(&self, request: &GenerationRequest) -> quire::Result<ChunkStream> {
        self.requests.lock().unwrap().push(request.clone());
        let chunks = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no canned stream left"))?;
        Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
    }
}

#[allow(dead_code)]
pub fn text_reply(deltas: &[&str]) -> Vec<StreamChunk> {
    let mut chunks: Vec<StreamChunk> = deltas
        .iter()
        .map(|d| StreamChunk::TextDelta(d.to_string()))
        .collect();
    chunks.push(StreamChunk::Finish {
        reason: FinishReason::Stop,
        usage: Some(TokenUsage::new(10, 4)),
    });
    chunks
}

#[allow(dead_code)]
pub fn tool_reply(id: &str, name: &str, args: serde_json::Value) -> Vec<StreamChunk> {
    vec![
        StreamChunk::ToolCall(ToolCall::new(id, name, args.to_string())),
        StreamChunk::Finish {
            reason: FinishReason::ToolCalls,
            usage: Some(TokenUsage::new(8, 2)),
        },
    ]
}

/// A router over a temporary database with one signed-in user
pub struct TestApp {
    pub router: Router,
    pub store: Arc<SqliteStorage>,
    pub provider: Arc<CannedProvider>,
    pub token: String,
    pub user_id: String,
    _dir: TempDir,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new(streams: Vec<Vec<StreamChunk>>) -> Self {
        let dir = TempDir::new().expect("failed to create tempdir");
        let store = Arc::new(
            SqliteStorage::new_with_path(dir.path().join("quire.db"))
                .expect("failed to create sqlite storage with path"),
        );
        let user = store
            .create_user("ada@example.com")
            .expect("failed to create user");
        let token = issue_session(&*store, &user.id, Duration::hours(1))
            .expect("failed to issue session");

        let config = Arc::new(Config::default());
        let provider = CannedProvider::new(streams);
        let tools = Arc::new(
            ToolRegistryBuilder::new(config.tools.clone())
                .build()
                .expect("failed to build tools"),
        );
        let store_dyn: Arc<dyn Store> = store.clone();
        let provider_dyn: Arc<dyn Provider> = provider.clone();
        let chat = ChatService::new(config, store_dyn, provider_dyn, tools);

        Self {
            router: router(AppState::new(chat)),
            store,
            provider,
            token,
            user_id: user.id,
            _dir: dir,
        }
    }

    /// Token for a second user
    pub fn other_token(&self) -> String {
        let user = self
            .store
            .create_user("eve@example.com")
            .expect("failed to create user");
        issue_session(&*self.store, &user.id, Duration::hours(1))
            .expect("failed to issue session")
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// POST /api/chat as the signed-in user and decode the stream
    pub async fn chat(&self, body: serde_json::Value) -> (StatusCode, Vec<StreamPart>) {
        let (status, text) = self
            .send(Method::POST, "/api/chat", Some(&self.token), Some(body))
            .await;
        let parts = if status.is_success() {
            decode_body(&text).expect("response is not a data stream")
        } else {
            Vec::new()
        };
        (status, parts)
    }
}

#[allow(dead_code)]
pub fn chat_body(chat_id: &str, text: &str, ephemeral: bool) -> serde_json::Value {
    serde_json::json!({
        "id": chat_id,
        "modelId": "gpt-4o-mini",
        "ephemeral": ephemeral,
        "messages": [
            {"id": "m1", "role": "user", "content": text}
        ]
    })
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
