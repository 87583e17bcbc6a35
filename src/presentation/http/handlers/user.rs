//! User Handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::shared::id::generate_user_id;
use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub online: bool,
}

#[derive(Debug, Serialize)]
pub struct GeneratedIdResponse {
    pub id: String,
}

/// Whether the user currently has a live session
pub async fn get_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<StatusResponse> {
    Json(StatusResponse {
        online: state.registry.is_online(&user_id),
    })
}

/// Random short user ID. Uniqueness is not checked.
pub async fn generate_id() -> Json<GeneratedIdResponse> {
    Json(GeneratedIdResponse {
        id: generate_user_id(),
    })
}
