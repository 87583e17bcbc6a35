//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response, Router};
use parking_lot::Mutex;
use tower::ServiceExt;

use chat_relay::application::dto::WireMessage;
use chat_relay::config::Settings;
use chat_relay::domain::{Message, Outbound, OutboundChannel};
use chat_relay::infrastructure::database::create_in_memory_pool;
use chat_relay::shared::error::TransportError;
use chat_relay::startup::{build_router, AppState};

/// Router and state over a private in-memory store
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = create_in_memory_pool()
            .await
            .expect("Failed to create in-memory store");
        let state = AppState::new(pool, Settings::in_memory());

        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    /// Open a relay session for `user_id` over a recording channel.
    pub async fn connect(&self, user_id: &str) -> (Arc<chat_relay::domain::Session>, Arc<TestChannel>) {
        let channel = TestChannel::new();
        let session = self.state.connections.connect(user_id, channel.clone()).await;
        (session, channel)
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> Response {
        self.request("GET", uri).await
    }

    /// Make a DELETE request to the application
    pub async fn delete(&self, uri: &str) -> Response {
        self.request("DELETE", uri).await
    }

    async fn request(&self, method: &str, uri: &str) -> Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// Outbound channel that records every write
#[derive(Default)]
pub struct TestChannel {
    sent: Mutex<Vec<Outbound>>,
}

impl TestChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.sent
            .lock()
            .iter()
            .filter_map(|o| match o {
                Outbound::Message(m) => Some(m.clone()),
                Outbound::Presence(_) => None,
            })
            .collect()
    }

    /// Everything written so far, as the client would see it
    pub fn wire(&self) -> Vec<WireMessage> {
        self.sent.lock().iter().map(WireMessage::from).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl OutboundChannel for TestChannel {
    async fn send(&self, outbound: &Outbound) -> Result<(), TransportError> {
        self.sent.lock().push(outbound.clone());
        Ok(())
    }
}
