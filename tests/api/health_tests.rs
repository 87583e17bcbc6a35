//! Health Check API Tests

use axum::http::StatusCode;

use crate::common::{body_json, body_text, TestApp};

#[tokio::test]
async fn test_ping_returns_pong() {
    let app = TestApp::new().await;

    let response = app.get("/ping").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "pong");
}

#[tokio::test]
async fn test_health_check_returns_json() {
    let app = TestApp::new().await;

    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new().await;

    let response = app.get("/health/live").await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_reports_store_and_sessions() {
    let app = TestApp::new().await;
    app.connect("A").await;

    let response = app.get("/health/ready").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["checks"]["database"]["status"], "healthy");
    assert_eq!(json["checks"]["websocket"]["online_sessions"], 1);
}

#[tokio::test]
async fn test_readiness_fails_when_store_is_down() {
    let app = TestApp::new().await;
    app.state.db.close().await;

    let response = app.get("/health/ready").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_relay_metrics() {
    let app = TestApp::new().await;
    app.get("/ping").await;

    let response = app.get("/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("chat_relay_http_requests_total"));
    assert!(body.contains("chat_relay_websocket_connections_active"));
}
