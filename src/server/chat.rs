//! `POST /api/chat` and `DELETE /api/chat`

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{ApiError, AppState};
use crate::chat::ChatRequest;
use crate::stream::{DATA_STREAM_HEADER, DATA_STREAM_VERSION};

pub(super) fn router() -> Router<AppState> {
    Router::new().route("/api/chat", post(post_chat).delete(delete_chat))
}

async fn post_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let session = state.session(&headers).await?;
    let rx = state.chat.submit(session, request).await?;

    let lines = UnboundedReceiverStream::new(rx).filter_map(|part| async move {
        match part.encode() {
            Ok(line) => Some(Ok::<_, Infallible>(Bytes::from(line))),
            Err(e) => {
                tracing::warn!("Dropping unencodable stream part: {:#}", e);
                None
            }
        }
    });

    let mut response = Body::from_stream(lines).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(DATA_STREAM_HEADER, HeaderValue::from_static(DATA_STREAM_VERSION));
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    id: Option<String>,
}

async fn delete_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DeleteParams>,
) -> Result<impl IntoResponse, ApiError> {
    let id = super::required(params.id)?;
    let session = state.session(&headers).await?;
    state.chat.delete(session, Some(&id)).await?;
    Ok((StatusCode::OK, "Chat deleted"))
}
