//! Documents and their suggestions

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use super::{required, ApiError, AppState};
use crate::auth::Session;
use crate::storage::{self, Document, DocumentKind, Suggestion};

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/api/document", get(get_document).post(save_document))
        .route("/api/suggestions", get(get_suggestions))
}

#[derive(Debug, Deserialize)]
struct DocumentParams {
    id: Option<String>,
}

/// Body of a manual document edit
#[derive(Debug, Deserialize)]
struct DocumentBody {
    title: String,
    kind: DocumentKind,
    content: String,
}

async fn owned_document(
    state: &AppState,
    session: &Session,
    id: &str,
) -> Result<Option<Document>, ApiError> {
    let id = id.to_string();
    match storage::blocking(state.store(), move |store| store.get_document(&id)).await? {
        Some(doc) if doc.user_id != session.user_id => Err(ApiError::Unauthorized),
        other => Ok(other),
    }
}

async fn get_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DocumentParams>,
) -> Result<Json<Document>, ApiError> {
    let id = required(params.id)?;
    let session = state.require_session(&headers).await?;
    let document = owned_document(&state, &session, &id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(document))
}

async fn save_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DocumentParams>,
    Json(body): Json<DocumentBody>,
) -> Result<Json<Document>, ApiError> {
    let id = required(params.id)?;
    let session = state.require_session(&headers).await?;
    let existing = owned_document(&state, &session, &id).await?;

    let document = match existing {
        Some(doc) => Document {
            title: body.title,
            content: body.content,
            ..doc
        },
        None => Document {
            id,
            title: body.title,
            kind: body.kind,
            content: body.content,
            user_id: session.user_id.clone(),
            created_at: Utc::now(),
        },
    };
    let saved = document.clone();
    storage::blocking(state.store(), move |store| store.save_document(&saved)).await?;
    Ok(Json(document))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionParams {
    document_id: Option<String>,
}

async fn get_suggestions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SuggestionParams>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    let document_id = required(params.document_id)?;
    let session = state.require_session(&headers).await?;
    let document = owned_document(&state, &session, &document_id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let suggestions = storage::blocking(state.store(), move |store| {
        store.get_suggestions_by_document(&document.id)
    })
    .await?;
    Ok(Json(suggestions))
}
