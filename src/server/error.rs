//! HTTP error responses
//!
//! Every handler returns `Result<T, ApiError>`. Bodies are plain text;
//! internal failures are logged with full detail and answered with a
//! generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::chat::ChatError;

/// Body returned for internal failures
pub const INTERNAL_MESSAGE: &str = "An error occurred while processing your request";

/// Errors a route can answer with
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing session, or a resource owned by someone else
    #[error("Unauthorized")]
    Unauthorized,

    /// Missing parameter or resource
    #[error("{0}")]
    NotFound(String),

    /// Malformed request
    #[error("{0}")]
    BadRequest(String),

    /// Unexpected failure
    #[error("internal error: {0}")]
    Internal(anyhow::Error),
}

impl ApiError {
    /// Plain `Not Found`
    pub fn not_found() -> Self {
        Self::NotFound("Not Found".to_string())
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Internal(e) => {
                error!(error = ?e, "request failed");
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Unauthorized | ChatError::NotOwner => Self::Unauthorized,
            ChatError::ModelNotFound => Self::NotFound(e.to_string()),
            ChatError::NoUserMessage => Self::BadRequest(e.to_string()),
            ChatError::NotFound => Self::not_found(),
            ChatError::Internal(inner) => Self::Internal(inner),
        }
    }
}
