//! Message wire schema.
//!
//! Every frame in both directions, and every history entry served over HTTP,
//! is one flat JSON object:
//!
//! ```json
//! {"id": "m1", "fromId": "A", "toId": "B", "content": "hi",
//!  "timestamp": "2024-01-01T00:00:00Z", "delivered": false,
//!  "readStatus": false, "status": "sent"}
//! ```
//!
//! Reserved `content` values (`delivered`, `read`, `status_update`) mark
//! control frames. This module is the only place that translates between
//! that flat shape and the domain types.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DeliveryState, Message, MessageKind, Outbound, PresenceNotice};

/// Reserved content value for presence notices.
pub const STATUS_UPDATE_CONTENT: &str = "status_update";

/// ID prefix of presence notices (`status_<userId>`).
pub const STATUS_ID_PREFIX: &str = "status_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub from_id: String,

    #[serde(default)]
    pub to_id: String,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub delivered: bool,

    #[serde(default)]
    pub read_status: bool,

    #[serde(default)]
    pub status: String,
}

impl WireMessage {
    pub fn is_presence_notice(&self) -> bool {
        self.content == STATUS_UPDATE_CONTENT
    }

    /// Translate an inbound frame into a domain message.
    ///
    /// Returns `None` for presence notices, which clients have no business
    /// sending. A missing (or zero) timestamp becomes `received_at`. The
    /// message enters the relay as `Sent`: whatever the client claims, it
    /// has not reached its addressee yet.
    pub fn into_message(self, received_at: DateTime<Utc>) -> Option<Message> {
        if self.is_presence_notice() {
            return None;
        }

        let timestamp = match self.timestamp {
            Some(ts) if ts.year() > 1 => ts,
            _ => received_at,
        };

        Some(Message {
            kind: MessageKind::from_content(&self.id, &self.content),
            id: self.id,
            sender_id: self.from_id,
            recipient_id: self.to_id,
            timestamp,
            state: DeliveryState::Sent,
        })
    }
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        // Acknowledgements describe the acknowledged message, so their flags
        // come from the kind rather than from the row's own state.
        let state = match &message.kind {
            MessageKind::Chat(_) => message.state,
            MessageKind::DeliveryAck { .. } => DeliveryState::Delivered,
            MessageKind::ReadAck { .. } => DeliveryState::Read,
        };

        Self {
            id: message.id.clone(),
            from_id: message.sender_id.clone(),
            to_id: message.recipient_id.clone(),
            content: message.content().to_string(),
            timestamp: Some(message.timestamp),
            delivered: state.is_delivered(),
            read_status: state.is_read(),
            status: state.as_str().to_string(),
        }
    }
}

impl From<&PresenceNotice> for WireMessage {
    fn from(notice: &PresenceNotice) -> Self {
        Self {
            id: format!("{}{}", STATUS_ID_PREFIX, notice.user_id),
            from_id: notice.user_id.clone(),
            to_id: String::new(),
            content: STATUS_UPDATE_CONTENT.to_string(),
            timestamp: Some(notice.timestamp),
            delivered: false,
            read_status: false,
            status: notice.presence.as_str().to_string(),
        }
    }
}

impl From<&Outbound> for WireMessage {
    fn from(outbound: &Outbound) -> Self {
        match outbound {
            Outbound::Message(message) => Self::from(message),
            Outbound::Presence(notice) => Self::from(notice),
        }
    }
}
