//! WebSocket Connection Handler
//!
//! Upgrades `/ws/{user_id}`, splits the socket and hands both halves to the
//! connection service. Text frames are relay traffic; a binary frame is a
//! protocol error and a close frame (or read error) ends the session.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{future, StreamExt};

use super::channel::WsChannel;
use crate::shared::error::{ConnectionError, ProtocolError, TransportError};
use crate::startup::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let limits = &state.settings.websocket;
    ws.max_message_size(limits.max_message_size)
        .max_frame_size(limits.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, user_id: String, state: AppState) {
    tracing::debug!(user_id = %user_id, "New WebSocket connection");

    let (sink, stream) = socket.split();
    let channel = Arc::new(WsChannel::new(sink));

    let inbound = stream.filter_map(|frame| future::ready(classify(frame)));

    state.connections.run(&user_id, channel, inbound).await;
}

/// Map a raw frame to relay input. Control frames are skipped.
fn classify(frame: Result<Message, axum::Error>) -> Option<Result<String, ConnectionError>> {
    match frame {
        Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
        Ok(Message::Binary(_)) => Some(Err(ProtocolError::UnsupportedFrame("binary").into())),
        Ok(Message::Close(_)) => Some(Err(TransportError::Closed.into())),
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
        Err(e) => Some(Err(TransportError::Receive(e.to_string()).into())),
    }
}
