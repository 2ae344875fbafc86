//! Chat endpoints.
//!
//! Adapters never surface errors; anything past validation comes back as a
//! 200 with an assistant message, degraded or not.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::agents::ChatReply;

use super::routes::AppState;

/// Create chat routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/:provider", post(chat))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// POST /api/chat/:provider - Process a chat message with the named agent.
async fn chat(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, (StatusCode, String)> {
    if req.message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Message is required".to_string()));
    }

    let agent = state.agents.get(&provider).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("Unknown chat provider: {}", provider),
        )
    })?;

    let reply = agent
        .process_message(&req.message, req.session_id.as_deref())
        .await;
    Ok(Json(reply))
}
