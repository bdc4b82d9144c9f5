use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::engine::SourceRef;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "ci_name": state.config.identity.ci_name,
        "rag_active": state.engine.has_index(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    /// Conversation memory key; a fresh one is minted when absent.
    pub session_id: Option<String>,
    /// Identity mutation key; defaults to the session id.
    pub channel_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
    pub sources: Vec<SourceRef>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatResponse>, ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let session_id = body
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let channel_id = body.channel_id.unwrap_or_else(|| session_id.clone());

    let reply = state
        .engine
        .respond(&body.message, &session_id, &channel_id)
        .await?;

    Ok(Json(ChatResponse {
        session_id,
        reply: reply.text,
        sources: reply.sources,
    }))
}

pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.engine.reset(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
