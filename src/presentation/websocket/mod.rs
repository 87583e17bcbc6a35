//! WebSocket Endpoint
//!
//! One connection per user at `/ws/{user_id}`; the relay protocol itself
//! lives in the connection service.

pub mod channel;
pub mod handler;

pub use channel::WsChannel;
pub use handler::ws_handler;
