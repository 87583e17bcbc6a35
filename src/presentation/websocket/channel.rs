//! Outbound channel over the write half of an axum WebSocket.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::Mutex;

use crate::application::dto::WireMessage;
use crate::domain::{Outbound, OutboundChannel};
use crate::shared::error::TransportError;

/// Every call arrives through `Session`, which already serializes them.
/// The mutex only provides `&mut` access to the sink from `&self` and is
/// never contended.
pub struct WsChannel {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsChannel {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl OutboundChannel for WsChannel {
    async fn send(&self, outbound: &Outbound) -> Result<(), TransportError> {
        let text = serde_json::to_string(&WireMessage::from(outbound))?;
        self.sink
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    /// Send a close frame. Errors are ignored; the peer may already be gone.
    async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let _ = sink.send(Message::Close(None)).await;
        let _ = sink.close().await;
    }
}
