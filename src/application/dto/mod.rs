//! Data Transfer Objects
//!
//! Serialized shapes shared by the WebSocket protocol and the HTTP API.

pub mod message;

pub use message::{WireMessage, STATUS_ID_PREFIX, STATUS_UPDATE_CONTENT};
