//! End-to-end relay scenarios over the connection service

use pretty_assertions::assert_eq;
use serde_json::json;

use chat_relay::domain::DeliveryState;

use crate::common::{body_json, TestApp};

#[tokio::test]
async fn test_offline_message_is_delivered_on_connect_and_confirmed() {
    let app = TestApp::new().await;
    let (a, a_channel) = app.connect("A").await;

    app.state
        .connections
        .handle_frame(&a, &json!({"id": "m1", "fromId": "A", "toId": "B", "content": "hi"}).to_string())
        .await
        .unwrap();

    let stored = app.state.store.find_by_id("m1").await.unwrap().unwrap();
    assert_eq!(stored.state, DeliveryState::Sent);
    a_channel.clear();

    let (_b, b_channel) = app.connect("B").await;

    let received: Vec<String> = b_channel.messages().into_iter().map(|m| m.id).collect();
    assert_eq!(received, vec!["m1"]);

    let history = body_json(app.get("/messages/B").await).await;
    assert_eq!(history[0]["id"], "m1");
    assert_eq!(history[0]["status"], "delivered");
    assert_eq!(history[0]["delivered"], true);

    let confirmations = a_channel.wire();
    let confirmation = confirmations
        .iter()
        .find(|w| w.id == "delivery_m1")
        .expect("sender should receive a delivery confirmation");
    assert_eq!(confirmation.from_id, "B");
    assert_eq!(confirmation.to_id, "A");
    assert_eq!(confirmation.content, "delivered");
    assert_eq!(confirmation.status, "delivered");
}

#[tokio::test]
async fn test_live_message_is_not_persisted() {
    let app = TestApp::new().await;
    let (a, a_channel) = app.connect("A").await;
    let (_b, b_channel) = app.connect("B").await;

    app.state
        .connections
        .handle_frame(&a, &json!({"id": "m1", "toId": "B", "content": "hi"}).to_string())
        .await
        .unwrap();

    let delivered = b_channel.wire();
    let message = delivered.iter().find(|w| w.id == "m1").unwrap();
    assert_eq!(message.from_id, "A");
    assert!(a_channel.wire().iter().any(|w| w.id == "delivery_m1"));

    let history = body_json(app.get("/messages/A").await).await;
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn test_read_ack_advances_stored_message() {
    let app = TestApp::new().await;
    let (a, _) = app.connect("A").await;
    app.state
        .connections
        .handle_frame(&a, &json!({"id": "m1", "toId": "B", "content": "hi"}).to_string())
        .await
        .unwrap();

    let (b, _) = app.connect("B").await;
    app.state
        .connections
        .handle_frame(&b, &json!({"id": "read_m1", "toId": "A", "content": "read"}).to_string())
        .await
        .unwrap();

    let stored = app.state.store.find_by_id("m1").await.unwrap().unwrap();
    assert_eq!(stored.state, DeliveryState::Read);
}

#[tokio::test]
async fn test_presence_is_announced_to_others_only() {
    let app = TestApp::new().await;
    let (_a, a_channel) = app.connect("A").await;
    let (b, b_channel) = app.connect("B").await;

    let seen_by_b: Vec<(String, String)> = b_channel
        .wire()
        .into_iter()
        .filter(|w| w.is_presence_notice())
        .map(|w| (w.from_id, w.status))
        .collect();
    assert_eq!(seen_by_b, vec![("A".to_string(), "online".to_string())]);

    a_channel.clear();
    app.state.connections.disconnect(&b).await;

    let seen_by_a: Vec<(String, String)> = a_channel
        .wire()
        .into_iter()
        .map(|w| (w.from_id, w.status))
        .collect();
    assert_eq!(seen_by_a, vec![("B".to_string(), "offline".to_string())]);
}
