//! Message entity and store trait.
//!
//! Maps to the `messages` table:
//! - id: TEXT PRIMARY KEY (client-assigned)
//! - from_id: TEXT NOT NULL
//! - to_id: TEXT NOT NULL
//! - content: TEXT NOT NULL
//! - timestamp: DATETIME NOT NULL
//! - delivered: BOOLEAN NOT NULL
//! - read_status: BOOLEAN NOT NULL
//! - status: TEXT NOT NULL ('sent' | 'delivered' | 'read')

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::StoreError;

/// Reserved content value for delivery acknowledgements.
pub const DELIVERED_CONTENT: &str = "delivered";

/// Reserved content value for read acknowledgements.
pub const READ_CONTENT: &str = "read";

/// ID prefix of delivery acknowledgements (`delivery_<messageId>`).
pub const DELIVERY_ACK_PREFIX: &str = "delivery_";

/// ID prefix of read acknowledgements (`read_<messageId>`).
pub const READ_ACK_PREFIX: &str = "read_";

/// Delivery state of a message. Ordered so that `Sent < Delivered < Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    #[default]
    Sent,
    Delivered,
    Read,
}

impl DeliveryState {
    /// Parse the `status` column / wire field. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            _ => None,
        }
    }

    /// Derive the state from the `delivered` / `readStatus` flag pair.
    pub fn from_flags(delivered: bool, read: bool) -> Self {
        match (delivered, read) {
            (_, true) => Self::Read,
            (true, false) => Self::Delivered,
            (false, false) => Self::Sent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }

    pub fn is_delivered(&self) -> bool {
        *self >= Self::Delivered
    }

    pub fn is_read(&self) -> bool {
        *self == Self::Read
    }

    /// Combine two states without ever moving backwards.
    pub fn advance(self, to: Self) -> Self {
        self.max(to)
    }
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a message carries: conversational text or an acknowledgement of
/// an earlier message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Chat(String),
    DeliveryAck { message_id: String },
    ReadAck { message_id: String },
}

impl MessageKind {
    /// Classify stored or inbound content. Acknowledgements recover the
    /// acknowledged message ID from their own ID.
    pub fn from_content(id: &str, content: &str) -> Self {
        match content {
            DELIVERED_CONTENT => Self::DeliveryAck {
                message_id: acknowledged_message_id(id).to_string(),
            },
            READ_CONTENT => Self::ReadAck {
                message_id: acknowledged_message_id(id).to_string(),
            },
            text => Self::Chat(text.to_string()),
        }
    }

    /// Content column / wire value.
    pub fn content(&self) -> &str {
        match self {
            Self::Chat(text) => text,
            Self::DeliveryAck { .. } => DELIVERED_CONTENT,
            Self::ReadAck { .. } => READ_CONTENT,
        }
    }

    pub fn is_acknowledgement(&self) -> bool {
        !matches!(self, Self::Chat(_))
    }

    /// The state an acknowledgement moves its target message to.
    pub fn acknowledged_state(&self) -> Option<(&str, DeliveryState)> {
        match self {
            Self::Chat(_) => None,
            Self::DeliveryAck { message_id } => Some((message_id, DeliveryState::Delivered)),
            Self::ReadAck { message_id } => Some((message_id, DeliveryState::Read)),
        }
    }
}

/// Strip a known acknowledgement prefix from an acknowledgement ID.
pub fn acknowledged_message_id(ack_id: &str) -> &str {
    ack_id
        .strip_prefix(DELIVERY_ACK_PREFIX)
        .or_else(|| ack_id.strip_prefix(READ_ACK_PREFIX))
        .unwrap_or(ack_id)
}

/// A unit of conversation between two users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Client-assigned ID (primary key)
    pub id: String,

    pub sender_id: String,

    pub recipient_id: String,

    pub kind: MessageKind,

    /// Assigned at receipt when the client omits it
    pub timestamp: DateTime<Utc>,

    /// Delivery state of this row itself
    pub state: DeliveryState,
}

impl Message {
    /// Build a fresh chat message in the `Sent` state.
    pub fn chat(
        id: impl Into<String>,
        sender_id: impl Into<String>,
        recipient_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sender_id: sender_id.into(),
            recipient_id: recipient_id.into(),
            kind: MessageKind::Chat(text.into()),
            timestamp: Utc::now(),
            state: DeliveryState::Sent,
        }
    }

    pub fn content(&self) -> &str {
        self.kind.content()
    }

    pub fn is_acknowledgement(&self) -> bool {
        self.kind.is_acknowledgement()
    }

    /// Synthesize the confirmation sent back to this message's sender once
    /// it reached the recipient.
    pub fn delivery_confirmation(&self) -> Message {
        Message {
            id: format!("{}{}", DELIVERY_ACK_PREFIX, self.id),
            sender_id: self.recipient_id.clone(),
            recipient_id: self.sender_id.clone(),
            kind: MessageKind::DeliveryAck {
                message_id: self.id.clone(),
            },
            timestamp: Utc::now(),
            state: DeliveryState::Delivered,
        }
    }
}

/// Durable message storage.
///
/// Multi-row operations are atomic: they either apply to every qualifying
/// row or to none.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message with its current state. Fails on duplicate ID.
    async fn insert(&self, message: &Message) -> Result<(), StoreError>;

    /// Move one message forward to `state`. Never regresses.
    /// Returns whether a row with that ID exists.
    async fn update_delivery_state(
        &self,
        message_id: &str,
        state: DeliveryState,
    ) -> Result<bool, StoreError>;

    /// Mark the listed messages addressed to `recipient_id` that are still
    /// `Sent` as `Delivered`, in one transaction. Returns the IDs that changed.
    async fn mark_delivered(
        &self,
        recipient_id: &str,
        message_ids: &[String],
    ) -> Result<Vec<String>, StoreError>;

    /// Mark every `Sent` message addressed to `recipient_id` as `Delivered`,
    /// in one transaction. Returns the IDs that changed.
    async fn mark_all_delivered(&self, recipient_id: &str) -> Result<Vec<String>, StoreError>;

    async fn find_by_id(&self, message_id: &str) -> Result<Option<Message>, StoreError>;

    /// All messages sent or received by `user_id`, ascending by timestamp.
    async fn query_conversation(&self, user_id: &str) -> Result<Vec<Message>, StoreError>;

    /// `Sent` messages addressed to `recipient_id`, ascending by timestamp.
    async fn query_undelivered(&self, recipient_id: &str) -> Result<Vec<Message>, StoreError>;

    /// Remove every message between the two users, in either direction.
    /// Returns the number of rows removed.
    async fn delete_conversation(&self, user_a: &str, user_b: &str) -> Result<u64, StoreError>;
}
