//! OpenAI-compatible provider implementation for Quire
//!
//! Talks to any endpoint implementing `POST /chat/completions`, both in
//! blocking mode (titles) and as a server-sent event stream (chat turns and
//! tool sub-generations). Streamed tool-call fragments are reassembled by
//! index before being handed to the orchestrator.

use crate::config::OpenAiConfig;
use crate::error::{QuireError, Result};
use crate::providers::{
    ChunkStream, CompletionResponse, FinishReason, FunctionCall, GenerationRequest, Message,
    Provider, StreamChunk, TokenUsage, ToolCall,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// OpenAI-compatible chat completions provider
///
/// # Examples
///
/// ```no_run
/// use quire::config::OpenAiConfig;
/// use quire::providers::{GenerationRequest, Message, OpenAiProvider, Provider};
///
/// # async fn example() -> quire::error::Result<()> {
/// let config = OpenAiConfig {
///     api_base: "http://localhost:8080/v1".to_string(),
///     api_key: None,
///     timeout_seconds: 30,
/// };
/// let provider = OpenAiProvider::new(config)?;
/// let request = GenerationRequest::new("gpt-4o-mini", vec![Message::user("Hello!")]);
/// let completion = provider.complete(&request).await?;
/// println!("{}", completion.text());
/// # Ok(())
/// # }
/// ```
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prediction: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: serde_json::Value,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

impl From<WireUsage> for TokenUsage {
    fn from(usage: WireUsage) -> Self {
        TokenUsage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallFragment>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallFragment {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionFragment>,
}

#[derive(Debug, Deserialize)]
struct FunctionFragment {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

impl OpenAiProvider {
    /// Create a new provider
    ///
    /// # Errors
    ///
    /// Returns `QuireError::MissingCredentials` when targeting the hosted
    /// OpenAI API without a key, or a provider error if the HTTP client
    /// cannot be built
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.is_none() && config.api_base.contains("api.openai.com") {
            return Err(QuireError::MissingCredentials("openai".to_string()).into());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| QuireError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("Initialized OpenAI-compatible provider: {}", config.api_base);

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }

    fn build_request(&self, request: &GenerationRequest, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: request.model.clone(),
            messages: request
                .wire_messages()
                .into_iter()
                .map(convert_message)
                .collect(),
            tools: request
                .tools
                .iter()
                .cloned()
                .map(|function| WireTool {
                    tool_type: "function",
                    function,
                })
                .collect(),
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
            response_format: request.response_format.as_ref().map(|format| {
                serde_json::json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": format.name,
                        "schema": format.schema,
                    }
                })
            }),
            prediction: request.prediction.as_ref().map(|content| {
                serde_json::json!({
                    "type": "content",
                    "content": content,
                })
            }),
            temperature: request.temperature,
        }
    }

    async fn send(&self, body: &ChatCompletionRequest) -> Result<reqwest::Response> {
        let mut builder = self.client.post(self.endpoint()).json(body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!("OpenAI request failed: {}", e);
            QuireError::Provider(format!("OpenAI request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("OpenAI returned error {}: {}", status, error_text);
            return Err(QuireError::Provider(format!(
                "OpenAI returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        Ok(response)
    }
}

fn convert_message(message: Message) -> WireMessage {
    WireMessage {
        role: message.role,
        content: message.content,
        tool_calls: message.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|call| WireToolCall {
                    id: call.id,
                    call_type: function_type(),
                    function: WireFunctionCall {
                        name: call.function.name,
                        arguments: call.function.arguments,
                    },
                })
                .collect()
        }),
        tool_call_id: message.tool_call_id,
    }
}

fn convert_response_message(message: WireMessage) -> Message {
    let tool_calls: Vec<ToolCall> = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            function: FunctionCall {
                name: call.function.name,
                arguments: call.function.arguments,
            },
        })
        .collect();

    if tool_calls.is_empty() {
        Message::assistant(message.content.unwrap_or_default())
    } else {
        Message::assistant_with_tools(message.content, tool_calls)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(&self, request: &GenerationRequest) -> Result<CompletionResponse> {
        let body = self.build_request(request, false);
        tracing::debug!("Sending completion request for model {}", body.model);

        let response: ChatCompletionResponse = self.send(&body).await?.json().await.map_err(|e| {
            tracing::error!("Failed to parse OpenAI response: {}", e);
            QuireError::Provider(format!("Failed to parse OpenAI response: {}", e))
        })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| QuireError::Provider("OpenAI response had no choices".to_string()))?;

        tracing::debug!("Completion finished: {:?}", choice.finish_reason);

        let message = convert_response_message(choice.message);
        Ok(match response.usage {
            Some(usage) => CompletionResponse::with_usage(message, usage.into()),
            None => CompletionResponse::new(message),
        })
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<ChunkStream> {
        let body = self.build_request(request, true);
        tracing::debug!("Opening completion stream for model {}", body.model);

        let response = self.send(&body).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(parse_sse_stream(response.bytes_stream(), tx));

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

/// Tool call being assembled from streamed fragments
#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Reassembles streamed chunks into [`StreamChunk`]s
#[derive(Debug, Default)]
struct ChunkAssembler {
    pending: BTreeMap<usize, PendingToolCall>,
    finish_reason: Option<FinishReason>,
    usage: Option<TokenUsage>,
}

impl ChunkAssembler {
    fn accept(&mut self, chunk: ChatCompletionChunk) -> Vec<StreamChunk> {
        let mut out = Vec::new();

        if let Some(usage) = chunk.usage {
            self.usage = Some(usage.into());
        }

        for choice in chunk.choices {
            if let Some(text) = choice.delta.content {
                if !text.is_empty() {
                    out.push(StreamChunk::TextDelta(text));
                }
            }

            for fragment in choice.delta.tool_calls.unwrap_or_default() {
                let pending = self.pending.entry(fragment.index).or_default();
                if let Some(id) = fragment.id {
                    pending.id = id;
                }
                if let Some(function) = fragment.function {
                    if let Some(name) = function.name {
                        pending.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        pending.arguments.push_str(&arguments);
                    }
                }
            }

            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(FinishReason::from_openai(&reason));
                out.extend(self.drain_tool_calls());
            }
        }

        out
    }

    fn drain_tool_calls(&mut self) -> Vec<StreamChunk> {
        std::mem::take(&mut self.pending)
            .into_values()
            .filter(|call| !call.name.is_empty())
            .map(|call| StreamChunk::ToolCall(ToolCall::new(call.id, call.name, call.arguments)))
            .collect()
    }

    fn finish(&mut self) -> Vec<StreamChunk> {
        let mut out = self.drain_tool_calls();
        let reason = self.finish_reason.unwrap_or_else(|| {
            if out.is_empty() {
                FinishReason::Unknown
            } else {
                FinishReason::ToolCalls
            }
        });
        out.push(StreamChunk::Finish {
            reason,
            usage: self.usage,
        });
        out
    }
}

/// Parse an OpenAI server-sent event stream into generation chunks
///
/// Events are separated by blank lines; each `data:` payload is either a
/// JSON chunk or the `[DONE]` sentinel. A transport or decoding failure is
/// forwarded as an `Err` item and ends the stream.
///
/// # Arguments
///
/// * `byte_stream` - Raw response body
/// * `tx` - Channel receiving assembled chunks
pub(crate) async fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    tx: mpsc::UnboundedSender<Result<StreamChunk>>,
) {
    let mut buffer: Vec<u8> = Vec::new();
    let mut assembler = ChunkAssembler::default();

    tokio::pin!(byte_stream);

    while let Some(chunk_result) = byte_stream.next().await {
        let chunk = match chunk_result {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(Err(QuireError::Provider(format!(
                    "Stream interrupted: {}",
                    e
                ))
                .into()));
                return;
            }
        };

        buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        while let Some(pos) = find_event_boundary(&buffer) {
            let block: Vec<u8> = buffer.drain(..pos + 2).collect();
            match process_sse_event(&block[..pos], &mut assembler) {
                Ok(EventOutcome::Chunks(chunks)) => {
                    for chunk in chunks {
                        let _ = tx.send(Ok(chunk));
                    }
                }
                Ok(EventOutcome::Done) => {
                    for chunk in assembler.finish() {
                        let _ = tx.send(Ok(chunk));
                    }
                    return;
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    return;
                }
            }
        }
    }

    if !buffer.is_empty() {
        match process_sse_event(&buffer, &mut assembler) {
            Ok(EventOutcome::Chunks(chunks)) => {
                for chunk in chunks {
                    let _ = tx.send(Ok(chunk));
                }
            }
            Ok(EventOutcome::Done) => {}
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }

    for chunk in assembler.finish() {
        let _ = tx.send(Ok(chunk));
    }
}

enum EventOutcome {
    Chunks(Vec<StreamChunk>),
    Done,
}

fn find_event_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn process_sse_event(block: &[u8], assembler: &mut ChunkAssembler) -> Result<EventOutcome> {
    let text = std::str::from_utf8(block)
        .map_err(|e| QuireError::Provider(format!("Invalid UTF-8 in stream: {}", e)))?;

    let data: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .collect();

    if data.is_empty() {
        return Ok(EventOutcome::Chunks(Vec::new()));
    }

    let payload = data.join("\n");
    if payload == "[DONE]" {
        return Ok(EventOutcome::Done);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(&payload)
        .map_err(|e| QuireError::Provider(format!("Failed to parse stream chunk: {}", e)))?;

    Ok(EventOutcome::Chunks(assembler.accept(chunk)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn config(api_base: &str) -> OpenAiConfig {
        OpenAiConfig {
            api_base: api_base.to_string(),
            api_key: Some("test-key".to_string()),
            timeout_seconds: 5,
        }
    }

    async fn collect(parts: Vec<&'static str>) -> Vec<Result<StreamChunk>> {
        let body = stream::iter(
            parts
                .into_iter()
                .map(|p| Ok::<Bytes, reqwest::Error>(Bytes::from_static(p.as_bytes()))),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        parse_sse_stream(body, tx).await;
        UnboundedReceiverStream::new(rx).collect().await
    }

    #[test]
    fn test_missing_key_for_hosted_api() {
        let mut cfg = config("https://api.openai.com/v1");
        cfg.api_key = None;
        let err = OpenAiProvider::new(cfg).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<QuireError>(),
            Some(QuireError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_local_endpoint_without_key() {
        let mut cfg = config("http://localhost:8080/v1/");
        cfg.api_key = None;
        let provider = OpenAiProvider::new(cfg).unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_build_request_shape() {
        let provider = OpenAiProvider::new(config("http://localhost/v1")).unwrap();
        let request = GenerationRequest::new("gpt-4o", vec![Message::user("hi")])
            .with_system("sys")
            .with_tools(vec![serde_json::json!({"name": "getWeather"})])
            .with_schema("code", serde_json::json!({"type": "object"}))
            .with_prediction("draft");

        let body = serde_json::to_value(provider.build_request(&request, true)).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "getWeather");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "code");
        assert_eq!(body["prediction"]["content"], "draft");
        assert_eq!(body["stream_options"]["include_usage"], true);
    }

    #[test]
    fn test_build_request_omits_empty_tools() {
        let provider = OpenAiProvider::new(config("http://localhost/v1")).unwrap();
        let request = GenerationRequest::new("gpt-4o", vec![Message::user("hi")]);
        let body = serde_json::to_value(provider.build_request(&request, false)).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("stream_options").is_none());
    }

    #[tokio::test]
    async fn test_parse_text_stream() {
        let chunks = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2}}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;

        let chunks: Vec<StreamChunk> = chunks.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(
            chunks,
            vec![
                StreamChunk::TextDelta("Hel".to_string()),
                StreamChunk::TextDelta("lo".to_string()),
                StreamChunk::Finish {
                    reason: FinishReason::Stop,
                    usage: Some(TokenUsage::new(3, 2)),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_parse_tool_call_fragments_across_reads() {
        let chunks = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"getWeather\",\"arguments\":\"{\\\"lat\"}}]}}]}\n",
            "\ndata: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"itude\\\":1}\"}}]}}]}\r\n\r\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;

        let chunks: Vec<StreamChunk> = chunks.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(
            chunks,
            vec![
                StreamChunk::ToolCall(ToolCall::new("call_1", "getWeather", "{\"latitude\":1}")),
                StreamChunk::Finish {
                    reason: FinishReason::ToolCalls,
                    usage: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_parse_stream_without_done_still_finishes() {
        let chunks = collect(vec!["data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}"]).await;
        assert_eq!(chunks.len(), 2);
        assert!(matches!(
            chunks[1].as_ref().unwrap(),
            StreamChunk::Finish {
                reason: FinishReason::Unknown,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_parse_malformed_chunk_is_error() {
        let chunks = collect(vec!["data: {nope}\n\n", "data: [DONE]\n\n"]).await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_err());
    }

    #[tokio::test]
    async fn test_comments_and_blank_events_are_ignored() {
        let chunks = collect(vec![": keep-alive\n\n", "data: [DONE]\n\n"]).await;
        assert_eq!(chunks.len(), 1);
        assert!(matches!(
            chunks[0].as_ref().unwrap(),
            StreamChunk::Finish { .. }
        ));
    }
}
