//! Chat submission and deletion
//!
//! [`ChatService`] validates a submission, creates the chat when needed,
//! persists the user message, and hands the turn to the orchestrator in a
//! spawned task. Everything that can reject the request happens before the
//! stream opens.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn, Instrument};

use super::messages::{last_user_message, to_provider_messages, UiMessage};
use super::metrics::record_request;
use super::orchestrator::{Orchestrator, Turn};
use super::title::{fallback_title, generate_title};
use crate::auth::Session;
use crate::config::Config;
use crate::providers::Provider;
use crate::storage::{self, Chat, Store, StoredMessage};
use crate::stream::{EventSink, StreamPart};
use crate::tools::ToolRegistry;

/// Body of `POST /api/chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Conversation id, chosen by the client
    pub id: String,
    /// Full conversation so far, ending with the new user message
    pub messages: Vec<UiMessage>,
    /// Id of a configured chat model
    pub model_id: String,
    /// Inline chat that is deleted on close
    #[serde(default)]
    pub ephemeral: bool,
}

/// Why a chat request was rejected
#[derive(Debug, Error)]
pub enum ChatError {
    /// No valid session
    #[error("Unauthorized")]
    Unauthorized,

    /// The chat belongs to someone else
    #[error("Unauthorized")]
    NotOwner,

    /// Model selector matches no configured model
    #[error("Model not found")]
    ModelNotFound,

    /// No user-authored message in the conversation
    #[error("No user message found")]
    NoUserMessage,

    /// Missing id parameter or missing chat
    #[error("Not Found")]
    NotFound,

    /// Persistence or other unexpected failure
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ChatError {
    /// Label used for the request outcome metric
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Unauthorized | Self::NotOwner => "unauthorized",
            Self::ModelNotFound => "model_not_found",
            Self::NoUserMessage => "bad_request",
            Self::NotFound => "not_found",
            Self::Internal(_) => "error",
        }
    }
}

/// Entry point for chat submissions and deletions
#[derive(Clone)]
pub struct ChatService {
    config: Arc<Config>,
    store: Arc<dyn Store>,
    provider: Arc<dyn Provider>,
    orchestrator: Arc<Orchestrator>,
}

impl ChatService {
    /// Create the service
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn Store>,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&provider),
            tools,
            Arc::clone(&store),
            config.agent.max_steps,
        ));
        Self {
            config,
            store,
            provider,
            orchestrator,
        }
    }

    /// Shared store
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Loaded configuration
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Accept a submission and start streaming the response
    ///
    /// On success the chat and the user message are already persisted and
    /// the turn runs in a background task writing to the returned receiver.
    ///
    /// # Errors
    ///
    /// Returns a [`ChatError`] describing why nothing was streamed
    pub async fn submit(
        &self,
        session: Option<Session>,
        request: ChatRequest,
    ) -> Result<UnboundedReceiver<StreamPart>, ChatError> {
        let result = self.prepare(session, request).await;
        record_request(match &result {
            Ok(_) => "accepted",
            Err(e) => e.outcome(),
        });

        let turn = result?;
        let (sink, rx) = EventSink::channel();
        let orchestrator = Arc::clone(&self.orchestrator);
        let span = tracing::info_span!(
            "chat_turn",
            chat_id = %turn.chat_id,
            user_id = %turn.session.user_id
        );
        tokio::spawn(
            async move {
                orchestrator.run(turn, sink).await;
            }
            .instrument(span),
        );

        Ok(rx)
    }

    async fn prepare(&self, session: Option<Session>, request: ChatRequest) -> Result<Turn, ChatError> {
        let session = session.ok_or(ChatError::Unauthorized)?;
        let model = self
            .config
            .find_model(&request.model_id)
            .cloned()
            .ok_or(ChatError::ModelNotFound)?;
        let user_message = last_user_message(&request.messages)
            .cloned()
            .ok_or(ChatError::NoUserMessage)?;

        let now = Utc::now();
        let lease = Duration::seconds(self.config.inline.lease_seconds);

        let chat_id = request.id.clone();
        let existing =
            storage::blocking(&self.store, move |store| store.get_chat(&chat_id)).await?;

        match existing {
            Some(chat) if chat.user_id != session.user_id => {
                warn!(chat_id = %chat.id, "Rejected submission to chat owned by another user");
                return Err(ChatError::NotOwner);
            }
            Some(chat) => {
                if chat.ephemeral {
                    storage::blocking(&self.store, move |store| {
                        store.renew_lease(&chat.id, now + lease)
                    })
                    .await?;
                }
            }
            None => {
                let title = self.title_for(&user_message.content).await;
                let chat = Chat {
                    id: request.id.clone(),
                    user_id: session.user_id.clone(),
                    title,
                    created_at: now,
                    ephemeral: request.ephemeral,
                    lease_expires_at: request.ephemeral.then(|| now + lease),
                };
                info!(chat_id = %chat.id, ephemeral = chat.ephemeral, "Created chat");
                storage::blocking(&self.store, move |store| store.save_chat(&chat)).await?;
            }
        }

        let user_message_id = uuid::Uuid::new_v4().to_string();
        let row = StoredMessage {
            id: user_message_id.clone(),
            chat_id: request.id.clone(),
            role: "user".to_string(),
            content: serde_json::Value::String(user_message.content.clone()),
            created_at: now,
        };
        storage::blocking(&self.store, move |store| store.save_messages(&[row])).await?;

        Ok(Turn {
            chat_id: request.id,
            user_message_id,
            session,
            model,
            messages: to_provider_messages(&request.messages),
        })
    }

    async fn title_for(&self, message: &str) -> String {
        let Some(model) = self.config.title_chat_model() else {
            return fallback_title(message);
        };
        match generate_title(self.provider.as_ref(), &model.api_identifier, message).await {
            Ok(title) => title,
            Err(e) => {
                warn!("Title generation failed, using message text: {:#}", e);
                fallback_title(message)
            }
        }
    }

    /// Delete a chat owned by the requester
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing id or chat, `Unauthorized`/`NotOwner` for a
    /// missing session or foreign chat, `Internal` for store failures
    pub async fn delete(
        &self,
        session: Option<Session>,
        id: Option<&str>,
    ) -> Result<(), ChatError> {
        let id = id
            .filter(|id| !id.is_empty())
            .ok_or(ChatError::NotFound)?
            .to_string();
        let session = session.ok_or(ChatError::Unauthorized)?;

        let lookup = id.clone();
        let chat = storage::blocking(&self.store, move |store| store.get_chat(&lookup))
            .await?
            .ok_or(ChatError::NotFound)?;
        if chat.user_id != session.user_id {
            warn!(chat_id = %id, "Rejected deletion of chat owned by another user");
            return Err(ChatError::NotOwner);
        }

        let target = id.clone();
        if !storage::blocking(&self.store, move |store| store.delete_chat(&target)).await? {
            return Err(ChatError::NotFound);
        }
        info!(chat_id = %id, "Deleted chat");
        Ok(())
    }
}
