//! Chat history and message listing

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use super::{required, ApiError, AppState};
use crate::storage::{self, Chat, StoredMessage};

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/api/history", get(get_history))
        .route("/api/messages", get(get_messages))
}

/// Caller's durable chats, newest first; inline chats are never listed
async fn get_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Chat>>, ApiError> {
    let session = state.require_session(&headers).await?;
    let chats = storage::blocking(state.store(), move |store| {
        store.list_chats_for_user(&session.user_id, false)
    })
    .await?;
    Ok(Json(chats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagesParams {
    chat_id: Option<String>,
}

async fn get_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<MessagesParams>,
) -> Result<Json<Vec<StoredMessage>>, ApiError> {
    let session = state.require_session(&headers).await?;
    let chat_id = required(params.chat_id)?;
    let chat = state.owned_chat(&session, &chat_id).await?;
    let messages =
        storage::blocking(state.store(), move |store| store.get_messages_by_chat(&chat.id)).await?;
    Ok(Json(messages))
}
