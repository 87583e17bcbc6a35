//! Delivery Service
//!
//! Live delivery with durable fallback. A message is written to the store
//! only when it could not be handed to the recipient's channel; a message
//! that reached the recipient live is never persisted.
//!
//! | kind          | effect                                                          |
//! |---------------|-----------------------------------------------------------------|
//! | chat          | deliver live, confirm to sender; otherwise persist as `Sent`    |
//! | delivery ack  | mark target `Delivered`, forward to sender; otherwise persist   |
//! | read ack      | mark target `Read`, forward to sender; otherwise persist        |
//!
//! Nothing here returns an error to the caller: failures are logged and the
//! message either falls back to the store or is dropped.

use std::sync::Arc;

use super::presence_registry::PresenceRegistry;
use crate::domain::{Message, MessageStore, Outbound};
use crate::infrastructure::metrics::{self, MessageOutcome};

pub struct DeliveryService {
    registry: Arc<PresenceRegistry>,
    store: Arc<dyn MessageStore>,
}

impl DeliveryService {
    pub fn new(registry: Arc<PresenceRegistry>, store: Arc<dyn MessageStore>) -> Self {
        Self { registry, store }
    }

    /// Route one inbound message.
    pub async fn dispatch(&self, message: Message) {
        if let Some((target_id, state)) = message.kind.acknowledged_state() {
            match self.store.update_delivery_state(target_id, state).await {
                Ok(true) => {
                    tracing::debug!(message_id = %target_id, state = %state, "Stored state advanced");
                }
                // Messages delivered live were never stored.
                Ok(false) => {
                    tracing::trace!(message_id = %target_id, "Acknowledged message not in store");
                }
                Err(e) => {
                    tracing::error!(
                        message_id = %target_id,
                        error = %e,
                        "Failed to update delivery state"
                    );
                }
            }
        }

        if !self.attempt_direct_delivery(&message).await {
            self.persist(&message).await;
        }
    }

    /// Try to hand the message to the recipient's live channel.
    ///
    /// Returns `true` only if the write succeeded. For chat messages a
    /// delivery confirmation is then sent to the sender on a best-effort
    /// basis; its failure does not change the result.
    pub async fn attempt_direct_delivery(&self, message: &Message) -> bool {
        let Some(recipient) = self.registry.lookup(&message.recipient_id) else {
            tracing::debug!(
                message_id = %message.id,
                recipient_id = %message.recipient_id,
                "Recipient offline"
            );
            return false;
        };

        if let Err(e) = recipient.send(&Outbound::Message(message.clone())).await {
            tracing::warn!(
                message_id = %message.id,
                recipient_id = %message.recipient_id,
                error = %e,
                "Live delivery failed"
            );
            return false;
        }

        tracing::debug!(
            message_id = %message.id,
            recipient_id = %message.recipient_id,
            "Delivered live"
        );
        metrics::record_message(MessageOutcome::DeliveredLive);

        if !message.is_acknowledgement() {
            self.confirm_delivery(message).await;
        }
        true
    }

    /// Best-effort delivery confirmation to the message's sender.
    pub async fn confirm_delivery(&self, message: &Message) {
        let confirmation = message.delivery_confirmation();

        let Some(sender) = self.registry.lookup(&message.sender_id) else {
            tracing::debug!(
                message_id = %message.id,
                sender_id = %message.sender_id,
                "Sender offline, confirmation skipped"
            );
            return;
        };

        if let Err(e) = sender.send(&Outbound::Message(confirmation)).await {
            tracing::warn!(
                message_id = %message.id,
                sender_id = %message.sender_id,
                error = %e,
                "Delivery confirmation failed"
            );
        }
    }

    /// Durable fallback. A failed insert loses the message.
    async fn persist(&self, message: &Message) {
        match self.store.insert(message).await {
            Ok(()) => {
                tracing::info!(
                    message_id = %message.id,
                    recipient_id = %message.recipient_id,
                    "Stored for later delivery"
                );
                metrics::record_message(MessageOutcome::Persisted);
            }
            Err(e) => {
                tracing::error!(
                    message_id = %message.id,
                    error = %e,
                    "Failed to store undelivered message, dropping"
                );
                metrics::record_message(MessageOutcome::Dropped);
            }
        }
    }
}
