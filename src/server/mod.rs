//! HTTP server
//!
//! [`router`] assembles the application: the chat endpoint, the
//! supplemental read/write endpoints used by the UI, model listing and a
//! health check. Handlers resolve the caller's session from the request
//! headers and share one [`AppState`].

mod chat;
mod documents;
pub mod error;
mod history;
mod meta;
mod votes;

pub use error::ApiError;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderMap;
use axum::Router;

use crate::auth::{resolve_session, Session};
use crate::chat::ChatService;
use crate::config::Config;
use crate::storage::{self, Chat, Store};

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Chat submission and deletion
    pub chat: ChatService,
}

impl AppState {
    /// Wrap a chat service
    pub fn new(chat: ChatService) -> Self {
        Self { chat }
    }

    /// Shared store
    pub fn store(&self) -> &Arc<dyn Store> {
        self.chat.store()
    }

    /// Loaded configuration
    pub fn config(&self) -> &Arc<Config> {
        self.chat.config()
    }

    /// Session of the caller, if any
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the session store cannot be queried
    pub async fn session(&self, headers: &HeaderMap) -> Result<Option<Session>, ApiError> {
        let headers = headers.clone();
        let session =
            storage::blocking(self.store(), move |store| resolve_session(store, &headers)).await?;
        Ok(session)
    }

    /// Session of the caller, or 401
    pub async fn require_session(&self, headers: &HeaderMap) -> Result<Session, ApiError> {
        self.session(headers).await?.ok_or(ApiError::Unauthorized)
    }

    /// Fetch a chat the caller owns: 404 when missing, 401 when foreign
    pub async fn owned_chat(&self, session: &Session, chat_id: &str) -> Result<Chat, ApiError> {
        let id = chat_id.to_string();
        let chat = storage::blocking(self.store(), move |store| store.get_chat(&id))
            .await?
            .ok_or_else(ApiError::not_found)?;
        if chat.user_id != session.user_id {
            return Err(ApiError::Unauthorized);
        }
        Ok(chat)
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let body_limit = state.config().server.max_body_bytes;

    Router::new()
        .merge(chat::router())
        .merge(history::router())
        .merge(documents::router())
        .merge(votes::router())
        .merge(meta::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Required query parameter, 404 when absent or empty
pub(crate) fn required(param: Option<String>) -> Result<String, ApiError> {
    param
        .filter(|value| !value.is_empty())
        .ok_or_else(ApiError::not_found)
}
