//! Route Configuration
//!
//! Configures all HTTP routes.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{delete, get},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::track_metrics;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(handlers::health::ping))
        // Relay endpoint
        .route("/ws/{user_id}", get(ws_handler))
        // History and administration
        .route("/messages/{user_id}", get(handlers::message::get_messages))
        .route(
            "/messages/{user_id}/{contact_id}",
            delete(handlers::message::delete_conversation),
        )
        .route("/status/{user_id}", get(handlers::user::get_status))
        .route("/generate-id", get(handlers::user::generate_id))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn(track_metrics))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}
