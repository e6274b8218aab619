//! Model listing and health check

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use super::AppState;

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/api/models", get(get_models))
        .route("/health", get(get_health))
}

/// Configured chat models and the default selection
async fn get_models(State(state): State<AppState>) -> Json<Value> {
    let config = state.config();
    Json(json!({
        "models": config.models,
        "defaultModel": config.default_model,
    }))
}

/// Liveness probe
async fn get_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
