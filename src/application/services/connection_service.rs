//! Connection Lifecycle
//!
//! Drives one connection through `Connecting → Active → Closing → Closed`:
//!
//! 1. connect: register the session, announce "online", replay stored
//!    history (flushing undelivered messages), send the presence snapshot
//! 2. active: read frames one at a time and hand them to the delivery
//!    service; any read or parse failure ends the loop
//! 3. close: mark offline, unregister, announce "offline". Runs once, and
//!    skips the registry and the announcement if a newer session for the
//!    same user has taken over
//!
//! The read side is any stream of text frames, so the transport stays
//! outside this module.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{Stream, StreamExt};

use super::delivery_service::DeliveryService;
use super::presence_registry::PresenceRegistry;
use crate::application::dto::WireMessage;
use crate::domain::{
    DeliveryState, MessageStore, Outbound, OutboundChannel, Presence, PresenceNotice, Session,
};
use crate::infrastructure::metrics;
use crate::shared::error::{ConnectionError, ProtocolError};

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

pub struct ConnectionService {
    registry: Arc<PresenceRegistry>,
    store: Arc<dyn MessageStore>,
    delivery: DeliveryService,
    write_timeout: Duration,
}

impl ConnectionService {
    pub fn new(
        registry: Arc<PresenceRegistry>,
        store: Arc<dyn MessageStore>,
        write_timeout: Duration,
    ) -> Self {
        let delivery = DeliveryService::new(registry.clone(), store.clone());
        Self {
            registry,
            store,
            delivery,
            write_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.registry
    }

    /// Run a connection to completion. Returns once the session is closed.
    pub async fn run<S>(&self, user_id: &str, channel: Arc<dyn OutboundChannel>, mut inbound: S)
    where
        S: Stream<Item = Result<String, ConnectionError>> + Unpin + Send,
    {
        tracing::debug!(user_id = %user_id, state = ?ConnectionState::Connecting, "Connection opened");
        let session = self.connect(user_id, channel).await;
        tracing::debug!(user_id = %user_id, state = ?ConnectionState::Active, "Session active");

        while let Some(frame) = inbound.next().await {
            let result = match frame {
                Ok(text) => self.handle_frame(&session, &text).await.map_err(ConnectionError::from),
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                tracing::info!(user_id = %user_id, error = %e, "Ending session");
                break;
            }
        }

        tracing::debug!(user_id = %user_id, state = ?ConnectionState::Closing, "Session closing");
        self.disconnect(&session).await;
        session.close().await;
        tracing::debug!(user_id = %user_id, state = ?ConnectionState::Closed, "Session closed");
    }

    /// Entry actions of `Active`, in order.
    pub async fn connect(&self, user_id: &str, channel: Arc<dyn OutboundChannel>) -> Arc<Session> {
        let session = Arc::new(Session::new(user_id, channel, self.write_timeout));

        if let Some(previous) = self.registry.register(session.clone()) {
            tracing::info!(
                user_id = %user_id,
                previous = %previous.token(),
                "Previous session superseded"
            );
        }
        metrics::session_opened();
        tracing::info!(
            user_id = %user_id,
            session = %session.token(),
            online = self.registry.len(),
            "User connected"
        );

        let online = Outbound::Presence(PresenceNotice::new(user_id, Presence::Online));
        self.registry.broadcast(&online, user_id).await;

        self.replay_history(&session).await;
        self.send_presence_snapshot(&session).await;

        session
    }

    /// Send the user's stored conversation, oldest first, then mark the
    /// undelivered messages that went out as delivered (in one transaction)
    /// and confirm them to their senders.
    ///
    /// Only rows that actually flip from `Sent` are confirmed, so replaying
    /// again never confirms the same message twice.
    pub async fn replay_history(&self, session: &Session) {
        let user_id = session.user_id();
        let history = match self.store.query_conversation(user_id).await {
            Ok(history) => history,
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Failed to load history");
                return;
            }
        };

        let mut pending = Vec::new();
        for message in history {
            if let Err(e) = session.send(&Outbound::Message(message.clone())).await {
                tracing::warn!(user_id = %user_id, error = %e, "History replay interrupted");
                break;
            }
            if message.recipient_id == user_id && message.state == DeliveryState::Sent {
                pending.push(message);
            }
        }

        if pending.is_empty() {
            return;
        }

        let ids: Vec<String> = pending.iter().map(|m| m.id.clone()).collect();
        let flipped = match self.store.mark_delivered(user_id, &ids).await {
            Ok(flipped) => flipped,
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Failed to mark backlog delivered");
                return;
            }
        };
        tracing::info!(user_id = %user_id, count = flipped.len(), "Backlog delivered");

        for message in pending.iter().filter(|m| flipped.contains(&m.id)) {
            if !message.is_acknowledgement() {
                self.delivery.confirm_delivery(message).await;
            }
        }
    }

    /// Tell the session who else is online.
    pub async fn send_presence_snapshot(&self, session: &Session) {
        for user_id in self.registry.snapshot_online(session.user_id()) {
            let notice = Outbound::Presence(PresenceNotice::new(user_id, Presence::Online));
            if let Err(e) = session.send(&notice).await {
                tracing::warn!(user_id = %session.user_id(), error = %e, "Presence snapshot interrupted");
                break;
            }
        }
    }

    /// Parse one inbound frame and hand it to the delivery service.
    pub async fn handle_frame(&self, session: &Session, text: &str) -> Result<(), ProtocolError> {
        let mut wire: WireMessage = serde_json::from_str(text)?;

        if wire.from_id != session.user_id() {
            if !wire.from_id.is_empty() {
                tracing::warn!(
                    user_id = %session.user_id(),
                    claimed = %wire.from_id,
                    "Sender ID does not match session, overriding"
                );
            }
            wire.from_id = session.user_id().to_string();
        }

        let Some(message) = wire.into_message(Utc::now()) else {
            tracing::debug!(user_id = %session.user_id(), "Ignoring client presence notice");
            return Ok(());
        };

        tracing::debug!(
            message_id = %message.id,
            from = %message.sender_id,
            to = %message.recipient_id,
            "Message received"
        );
        self.delivery.dispatch(message).await;
        Ok(())
    }

    /// Exit actions. Safe to call more than once.
    pub async fn disconnect(&self, session: &Session) {
        if !session.mark_offline() {
            return;
        }
        metrics::session_closed();

        if !self.registry.unregister_session(session) {
            tracing::info!(
                user_id = %session.user_id(),
                session = %session.token(),
                "Superseded session closed"
            );
            return;
        }

        tracing::info!(
            user_id = %session.user_id(),
            online = self.registry.len(),
            "User disconnected"
        );
        let offline = Outbound::Presence(PresenceNotice::new(session.user_id(), Presence::Offline));
        self.registry.broadcast(&offline, session.user_id()).await;
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::domain::test_support::RecordingChannel;
    use crate::domain::{Message, MessageKind};
    use crate::infrastructure::database::create_in_memory_pool;
    use crate::infrastructure::repositories::SqliteMessageRepository;

    async fn service() -> (ConnectionService, Arc<SqliteMessageRepository>) {
        let store = Arc::new(SqliteMessageRepository::new(create_in_memory_pool().await.unwrap()));
        let service = ConnectionService::new(
            Arc::new(PresenceRegistry::new()),
            store.clone(),
            Duration::from_secs(1),
        );
        (service, store)
    }

    fn presence(outbound: &[Outbound]) -> Vec<(String, Presence)> {
        outbound
            .iter()
            .filter_map(|o| match o {
                Outbound::Presence(n) => Some((n.user_id.clone(), n.presence)),
                Outbound::Message(_) => None,
            })
            .collect()
    }

    fn messages(outbound: &[Outbound]) -> Vec<Message> {
        outbound
            .iter()
            .filter_map(|o| match o {
                Outbound::Message(m) => Some(m.clone()),
                Outbound::Presence(_) => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_connect_announces_and_snapshots() {
        let (service, _) = service().await;
        let a = RecordingChannel::new();
        let b = RecordingChannel::new();

        service.connect("A", a.clone()).await;
        service.connect("B", b.clone()).await;

        assert_eq!(presence(&a.sent()), vec![("B".to_string(), Presence::Online)]);
        assert_eq!(presence(&b.sent()), vec![("A".to_string(), Presence::Online)]);
    }

    #[tokio::test]
    async fn test_disconnect_announces_offline_once() {
        let (service, _) = service().await;
        let a = RecordingChannel::new();
        let b = RecordingChannel::new();
        service.connect("A", a.clone()).await;
        let session_b = service.connect("B", b.clone()).await;
        a.take();

        service.disconnect(&session_b).await;
        service.disconnect(&session_b).await;

        assert_eq!(presence(&a.sent()), vec![("B".to_string(), Presence::Offline)]);
        assert!(presence(&b.sent()).iter().all(|(id, _)| id != "B"));
        assert!(!service.registry().is_online("B"));
    }

    #[tokio::test]
    async fn test_superseded_session_close_keeps_newer_session() {
        let (service, _) = service().await;
        let watcher = RecordingChannel::new();
        service.connect("W", watcher.clone()).await;
        let first = service.connect("A", RecordingChannel::new()).await;
        let second = service.connect("A", RecordingChannel::new()).await;
        watcher.take();

        service.disconnect(&first).await;

        assert_eq!(service.registry().lookup("A").unwrap().token(), second.token());
        assert!(watcher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_flushes_backlog_and_confirms() {
        let (service, store) = service().await;
        let a = RecordingChannel::new();
        let session_a = service.connect("A", a.clone()).await;

        service
            .handle_frame(&session_a, &json!({"id": "m1", "toId": "B", "content": "hi"}).to_string())
            .await
            .unwrap();
        let stored = store.find_by_id("m1").await.unwrap().unwrap();
        assert_eq!(stored.state, DeliveryState::Sent);
        assert_eq!(stored.sender_id, "A");
        a.take();

        let b = RecordingChannel::new();
        service.connect("B", b.clone()).await;

        let replayed = messages(&b.sent());
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].id, "m1");
        assert_eq!(store.find_by_id("m1").await.unwrap().unwrap().state, DeliveryState::Delivered);

        let confirmations = messages(&a.sent());
        assert_eq!(confirmations.len(), 1);
        assert_eq!(confirmations[0].id, "delivery_m1");
        assert_eq!(confirmations[0].recipient_id, "A");
        assert_eq!(confirmations[0].kind, MessageKind::DeliveryAck { message_id: "m1".into() });
    }

    #[tokio::test]
    async fn test_second_reconnect_does_not_reconfirm() {
        let (service, store) = service().await;
        store.insert(&Message::chat("m1", "A", "B", "hi")).await.unwrap();
        let a = RecordingChannel::new();
        service.connect("A", a.clone()).await;

        let first_b = service.connect("B", RecordingChannel::new()).await;
        service.disconnect(&first_b).await;
        a.take();
        service.connect("B", RecordingChannel::new()).await;

        assert!(messages(&a.sent()).is_empty());
    }

    #[tokio::test]
    async fn test_failed_replay_leaves_backlog_undelivered() {
        let (service, store) = service().await;
        store.insert(&Message::chat("m1", "A", "B", "hi")).await.unwrap();

        service.connect("B", RecordingChannel::failing()).await;

        assert_eq!(store.find_by_id("m1").await.unwrap().unwrap().state, DeliveryState::Sent);
    }

    #[tokio::test]
    async fn test_replay_is_ordered() {
        let (service, store) = service().await;
        for (id, offset) in [("m3", 30), ("m1", 10), ("m2", 20)] {
            let mut message = Message::chat(id, "A", "B", "x");
            message.timestamp = Utc::now() + chrono::Duration::seconds(offset);
            store.insert(&message).await.unwrap();
        }

        let b = RecordingChannel::new();
        service.connect("B", b.clone()).await;

        let ids: Vec<String> = messages(&b.sent()).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn test_malformed_frame_is_protocol_error() {
        let (service, _) = service().await;
        let session = service.connect("A", RecordingChannel::new()).await;

        let result = service.handle_frame(&session, "not json").await;

        assert!(matches!(result, Err(ProtocolError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_run_closes_session_on_malformed_frame() {
        let (service, store) = service().await;
        let watcher = RecordingChannel::new();
        service.connect("W", watcher.clone()).await;
        watcher.take();

        let frames = stream::iter(vec![
            Ok(json!({"id": "m1", "toId": "B", "content": "hi"}).to_string()),
            Ok("{broken".to_string()),
            Ok(json!({"id": "m2", "toId": "B", "content": "never"}).to_string()),
        ]);
        let channel = RecordingChannel::new();
        service.run("A", channel.clone(), frames).await;

        assert!(store.find_by_id("m1").await.unwrap().is_some());
        assert!(store.find_by_id("m2").await.unwrap().is_none());
        assert!(!service.registry().is_online("A"));
        assert!(channel.is_closed());
        assert_eq!(
            presence(&watcher.sent()),
            vec![("A".to_string(), Presence::Online), ("A".to_string(), Presence::Offline)]
        );
    }
}
