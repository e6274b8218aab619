//! Inline chat client
//!
//! A disposable conversation embedded in another view. Mounting picks a
//! fresh chat id; every message is submitted through `POST /api/chat` as an
//! ephemeral chat; closing deletes the chat on a best-effort basis. Chats
//! whose delete never arrives expire through the reaper.

use futures::StreamExt;
use reqwest::StatusCode;
use url::Url;

use crate::chat::{ChatRequest, ToolInvocation, UiMessage};
use crate::error::{QuireError, Result};
use crate::stream::{DataEvent, PartDecoder, StreamPart};

/// What happened to the server-side chat on close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The chat is gone (deleted now, or never created)
    Deleted,
    /// The delete failed; the chat expires with its lease
    LeftForReaper,
}

/// Decoded response to one inline message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineReply {
    /// Concatenated assistant text
    pub text: String,
    /// Custom data events, in order
    pub events: Vec<DataEvent>,
    /// Error parts written by the server
    pub errors: Vec<String>,
    /// Every decoded part
    pub parts: Vec<StreamPart>,
}

impl InlineReply {
    fn from_parts(parts: Vec<StreamPart>) -> Self {
        let mut reply = Self::default();
        for part in &parts {
            match part {
                StreamPart::Text(delta) => reply.text.push_str(delta),
                StreamPart::Error(message) => reply.errors.push(message.clone()),
                StreamPart::Data(_) => reply.events.extend(part.data_events()),
                _ => {}
            }
        }
        reply.parts = parts;
        reply
    }

    fn tool_invocations(&self) -> Vec<ToolInvocation> {
        let mut invocations: Vec<ToolInvocation> = Vec::new();
        for part in &self.parts {
            match part {
                StreamPart::ToolCall(call) => invocations.push(ToolInvocation {
                    state: "call".to_string(),
                    tool_call_id: call.tool_call_id.clone(),
                    tool_name: call.tool_name.clone(),
                    args: call.args.clone(),
                    result: None,
                }),
                StreamPart::ToolResult(result) => {
                    if let Some(inv) = invocations
                        .iter_mut()
                        .find(|inv| inv.tool_call_id == result.tool_call_id)
                    {
                        inv.state = "result".to_string();
                        inv.result = Some(result.result.clone());
                    }
                }
                _ => {}
            }
        }
        invocations
    }
}

/// Client for one inline conversation
#[derive(Debug)]
pub struct InlineChat {
    client: reqwest::Client,
    base_url: Url,
    token: String,
    model_id: String,
    chat_id: Option<String>,
    messages: Vec<UiMessage>,
}

impl InlineChat {
    /// Create an unmounted client
    ///
    /// # Arguments
    ///
    /// * `base_url` - Server root, e.g. `http://127.0.0.1:3000`
    /// * `token` - Bearer session token
    /// * `model_id` - Chat model to use
    ///
    /// # Errors
    ///
    /// Returns error if `base_url` is not a valid URL
    pub fn new(base_url: &str, token: impl Into<String>, model_id: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| QuireError::Config(format!("Invalid server URL {}: {}", base_url, e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            token: token.into(),
            model_id: model_id.into(),
            chat_id: None,
            messages: Vec::new(),
        })
    }

    /// Start a new throwaway conversation, returning its id
    pub fn mount(&mut self) -> &str {
        self.messages.clear();
        self.chat_id
            .insert(uuid::Uuid::new_v4().to_string())
            .as_str()
    }

    /// Id of the mounted conversation
    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    /// Messages exchanged so far
    pub fn messages(&self) -> &[UiMessage] {
        &self.messages
    }

    fn endpoint(&self) -> Result<Url> {
        self.base_url
            .join("/api/chat")
            .map_err(|e| QuireError::Config(format!("Invalid server URL: {}", e)).into())
    }

    /// Send a user message and read the whole streamed reply
    ///
    /// # Errors
    ///
    /// Returns error if the client is not mounted, the server rejects the
    /// request, or the stream cannot be decoded
    pub async fn send(&mut self, text: impl Into<String>) -> Result<InlineReply> {
        let chat_id = self
            .chat_id
            .clone()
            .ok_or_else(|| QuireError::Config("Inline chat is not mounted".to_string()))?;

        self.messages
            .push(UiMessage::user(uuid::Uuid::new_v4().to_string(), text));

        let request = ChatRequest {
            id: chat_id,
            messages: self.messages.clone(),
            model_id: self.model_id.clone(),
            ephemeral: true,
        };

        let response = self
            .client
            .post(self.endpoint()?)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // The message was not accepted
            self.messages.pop();
            return Err(QuireError::Provider(format!(
                "Chat request failed with {}: {}",
                status.as_u16(),
                body
            ))
            .into());
        }

        let mut decoder = PartDecoder::new();
        let mut parts = Vec::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            parts.extend(decoder.push(&chunk?)?);
        }
        if decoder.has_pending() {
            return Err(QuireError::StreamDecode("response ended mid-line".to_string()).into());
        }

        let reply = InlineReply::from_parts(parts);
        let invocations = reply.tool_invocations();
        self.messages.push(UiMessage {
            id: uuid::Uuid::new_v4().to_string(),
            role: "assistant".to_string(),
            content: reply.text.clone(),
            tool_invocations: (!invocations.is_empty()).then_some(invocations),
        });
        Ok(reply)
    }

    /// Delete the conversation and reset local state
    ///
    /// Local state is cleared whatever the server answers.
    pub async fn close(&mut self) -> CloseOutcome {
        self.messages.clear();
        let Some(chat_id) = self.chat_id.take() else {
            return CloseOutcome::Deleted;
        };

        let url = match self.endpoint() {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Inline chat {} not deleted: {:#}", chat_id, e);
                return CloseOutcome::LeftForReaper;
            }
        };

        let result = self
            .client
            .delete(url)
            .query(&[("id", chat_id.as_str())])
            .bearer_auth(&self.token)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => CloseOutcome::Deleted,
            // Never created: nothing was sent before close
            Ok(response) if response.status() == StatusCode::NOT_FOUND => CloseOutcome::Deleted,
            Ok(response) => {
                tracing::warn!(
                    "Inline chat {} not deleted: HTTP {}",
                    chat_id,
                    response.status().as_u16()
                );
                CloseOutcome::LeftForReaper
            }
            Err(e) => {
                tracing::warn!("Inline chat {} not deleted: {}", chat_id, e);
                CloseOutcome::LeftForReaper
            }
        }
    }
}
