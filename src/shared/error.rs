//! Application Error Types
//!
//! Error taxonomy for the relay plus the HTTP mapping used by the
//! administrative endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Durable store failures.
///
/// Every store operation that fails has already been rolled back by the
/// time this error is returned.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Duplicate message id: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &error {
            if db.is_unique_violation() {
                return StoreError::Duplicate(db.message().to_string());
            }
        }
        StoreError::Database(error)
    }
}

/// Outbound channel failures. Any of these means "recipient unreachable".
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Channel closed")]
    Closed,

    #[error("Write timed out after {0}ms")]
    Timeout(u64),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),
}

/// Malformed inbound traffic. Terminates the session like a read error.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid message payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Unsupported frame: {0}")]
    UnsupportedFrame(&'static str),
}

/// Anything that ends a session's read loop.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// HTTP-facing error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Store(e) => {
                tracing::error!("Store error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, 10000, "Internal server error".to_string())
            }
        };

        (status, Json(ErrorResponse { code, message })).into_response()
    }
}
