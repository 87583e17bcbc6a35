//! History and administrative endpoint tests

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use chat_relay::domain::Message;

use crate::common::{body_json, TestApp};

async fn seed(app: &TestApp, id: &str, from: &str, to: &str, offset_secs: i64) {
    let mut message = Message::chat(id, from, to, format!("content of {}", id));
    message.timestamp = Utc::now() + Duration::seconds(offset_secs);
    app.state.store.insert(&message).await.unwrap();
}

#[tokio::test]
async fn test_history_includes_both_directions_in_order() {
    let app = TestApp::new().await;
    seed(&app, "m2", "B", "A", 20).await;
    seed(&app, "m1", "A", "B", 10).await;
    seed(&app, "m3", "C", "D", 0).await;

    let response = app.get("/messages/A").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let ids: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["m1", "m2"]);
    assert_eq!(json[0]["fromId"], "A");
    assert_eq!(json[0]["status"], "sent");
    assert_eq!(json[0]["delivered"], false);
}

#[tokio::test]
async fn test_history_of_unknown_user_is_empty() {
    let app = TestApp::new().await;

    let json = body_json(app.get("/messages/NOBODY").await).await;

    assert_eq!(json, serde_json::json!([]));
}

#[tokio::test]
async fn test_delete_conversation_removes_both_directions_only() {
    let app = TestApp::new().await;
    seed(&app, "m1", "A", "B", 0).await;
    seed(&app, "m2", "B", "A", 1).await;
    seed(&app, "m3", "A", "C", 2).await;

    let response = app.delete("/messages/A/B").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["deleted"], 2);

    let remaining = body_json(app.get("/messages/A").await).await;
    assert_eq!(remaining.as_array().unwrap().len(), 1);
    assert_eq!(remaining[0]["id"], "m3");
}

#[tokio::test]
async fn test_delete_conversation_on_closed_store_is_500() {
    let app = TestApp::new().await;
    app.state.db.close().await;

    let response = app.delete("/messages/A/B").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], 10000);
}

#[tokio::test]
async fn test_status_tracks_sessions() {
    let app = TestApp::new().await;

    let before = body_json(app.get("/status/A").await).await;
    assert_eq!(before["online"], false);

    let (session, _) = app.connect("A").await;
    let during = body_json(app.get("/status/A").await).await;
    assert_eq!(during["online"], true);

    app.state.connections.disconnect(&session).await;
    let after = body_json(app.get("/status/A").await).await;
    assert_eq!(after["online"], false);
}

#[tokio::test]
async fn test_generate_id_shape() {
    let app = TestApp::new().await;

    let json = body_json(app.get("/generate-id").await).await;

    let id = json["id"].as_str().unwrap();
    assert_eq!(id.len(), 4);
    assert!(id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
}
