//! Message votes

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use super::{required, ApiError, AppState};
use crate::storage::{self, Vote};

pub(super) fn router() -> Router<AppState> {
    Router::new().route("/api/vote", get(get_votes).patch(patch_vote))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoteParams {
    chat_id: Option<String>,
}

async fn get_votes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<VoteParams>,
) -> Result<Json<Vec<Vote>>, ApiError> {
    let chat_id = required(params.chat_id)?;
    let session = state.require_session(&headers).await?;
    let chat = state.owned_chat(&session, &chat_id).await?;
    let votes =
        storage::blocking(state.store(), move |store| store.get_votes_by_chat(&chat.id)).await?;
    Ok(Json(votes))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoteBody {
    chat_id: String,
    message_id: String,
    #[serde(rename = "type")]
    vote_type: String,
}

async fn patch_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<VoteBody>,
) -> Result<impl IntoResponse, ApiError> {
    let is_upvoted = match body.vote_type.as_str() {
        "up" => true,
        "down" => false,
        other => return Err(ApiError::BadRequest(format!("Invalid vote type: {}", other))),
    };
    let session = state.require_session(&headers).await?;
    let chat = state.owned_chat(&session, &body.chat_id).await?;

    let vote = Vote {
        chat_id: chat.id,
        message_id: body.message_id,
        is_upvoted,
    };
    storage::blocking(state.store(), move |store| store.vote_message(&vote)).await?;
    Ok((StatusCode::OK, "Message voted"))
}
