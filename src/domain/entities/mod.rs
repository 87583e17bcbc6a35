//! # Domain Entities
//!
//! - **Message**: a unit of conversation or an acknowledgement, plus the
//!   `MessageStore` trait implemented by the infrastructure layer
//! - **Session**: a live connection bound to one user ID, plus the
//!   `OutboundChannel` seam implemented by the transport

mod message;
mod session;

pub use message::{
    acknowledged_message_id, DeliveryState, Message, MessageKind, MessageStore,
    DELIVERED_CONTENT, DELIVERY_ACK_PREFIX, READ_ACK_PREFIX, READ_CONTENT,
};
pub use session::{Outbound, OutboundChannel, Presence, PresenceNotice, Session};

#[cfg(test)]
pub use message::MockMessageStore;

#[cfg(test)]
pub(crate) use session::test_support;
