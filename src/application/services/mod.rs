//! Application Services
//!
//! The relay core, shared by every connection.
//!
//! ## Available Services
//!
//! - **PresenceRegistry**: user ID to live session map, presence broadcasts
//! - **DeliveryService**: live delivery with durable fallback, acknowledgements
//! - **ConnectionService**: per-connection lifecycle (connect, read loop, close)

pub mod connection_service;
pub mod delivery_service;
pub mod presence_registry;

pub use connection_service::{ConnectionService, ConnectionState};
pub use delivery_service::DeliveryService;
pub use presence_registry::PresenceRegistry;
