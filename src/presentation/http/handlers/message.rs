//! Message Handlers
//!
//! Read-only history and conversation deletion. Neither touches live
//! sessions.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::application::dto::WireMessage;
use crate::shared::error::AppError;
use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct DeleteConversationResponse {
    pub success: bool,
    pub deleted: u64,
}

/// Stored messages sent or received by the user, oldest first
pub async fn get_messages(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<WireMessage>>, AppError> {
    let messages = state.store.query_conversation(&user_id).await?;

    Ok(Json(messages.iter().map(WireMessage::from).collect()))
}

/// Delete every stored message between two users, in both directions
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path((user_id, contact_id)): Path<(String, String)>,
) -> Result<Json<DeleteConversationResponse>, AppError> {
    let deleted = state.store.delete_conversation(&user_id, &contact_id).await?;
    tracing::info!(user_id = %user_id, contact_id = %contact_id, deleted, "Conversation deleted");

    Ok(Json(DeleteConversationResponse {
        success: true,
        deleted,
    }))
}
