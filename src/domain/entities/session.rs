//! Live session entity and the outbound channel seam.
//!
//! A session binds one user ID to one outbound channel for the lifetime of
//! a connection. Sessions are never persisted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::message::Message;
use crate::shared::error::TransportError;

/// Online/offline transition announced to other users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    Offline,
}

impl Presence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for Presence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Presence notice about `user_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceNotice {
    pub user_id: String,
    pub presence: Presence,
    pub timestamp: DateTime<Utc>,
}

impl PresenceNotice {
    pub fn new(user_id: impl Into<String>, presence: Presence) -> Self {
        Self {
            user_id: user_id.into(),
            presence,
            timestamp: Utc::now(),
        }
    }
}

/// Everything the relay writes to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message(Message),
    Presence(PresenceNotice),
}

/// Write half of a client connection.
///
/// Every call is made through `Session`, which holds its write lock for the
/// duration, so implementations never see two calls at once.
#[async_trait]
pub trait OutboundChannel: Send + Sync {
    async fn send(&self, outbound: &Outbound) -> Result<(), TransportError>;

    /// Shut the channel down. Later sends may fail.
    async fn close(&self) {}
}

/// One active connection bound to a user ID.
pub struct Session {
    user_id: String,
    /// Generation token distinguishing this session from later ones
    /// registered under the same user ID.
    token: Uuid,
    channel: Arc<dyn OutboundChannel>,
    online: AtomicBool,
    /// Set after a timed-out write. The channel may hold a partly written
    /// frame, so nothing else is written to it.
    broken: AtomicBool,
    write_lock: Mutex<()>,
    write_timeout: Duration,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        channel: Arc<dyn OutboundChannel>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            token: Uuid::new_v4(),
            channel,
            online: AtomicBool::new(true),
            broken: AtomicBool::new(false),
            write_lock: Mutex::new(()),
            write_timeout,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    /// Online and still writable.
    pub fn is_reachable(&self) -> bool {
        self.is_online() && !self.is_broken()
    }

    /// Flip the session offline. Returns `true` only for the first call.
    pub fn mark_offline(&self) -> bool {
        self.online.swap(false, Ordering::AcqRel)
    }

    /// Single write attempt, serialized against every other writer of this
    /// session and bounded by the write timeout (lock wait included).
    ///
    /// A timeout breaks the session: the channel is closed and every later
    /// send fails with `Closed` without touching it.
    pub async fn send(&self, outbound: &Outbound) -> Result<(), TransportError> {
        if self.is_broken() {
            return Err(TransportError::Closed);
        }

        let attempt = async {
            let _guard = self.write_lock.lock().await;
            if self.is_broken() {
                return Err(TransportError::Closed);
            }
            self.channel.send(outbound).await
        };

        match tokio::time::timeout(self.write_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => {
                self.mark_broken().await;
                Err(TransportError::Timeout(self.write_timeout.as_millis() as u64))
            }
        }
    }

    /// Close the channel under the write lock, bounded by the write timeout.
    pub async fn close(&self) {
        let close = async {
            let _guard = self.write_lock.lock().await;
            self.channel.close().await;
        };

        if tokio::time::timeout(self.write_timeout, close).await.is_err() {
            tracing::warn!(user_id = %self.user_id, session = %self.token, "Channel close timed out");
        }
    }

    async fn mark_broken(&self) {
        if self.broken.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::warn!(
            user_id = %self.user_id,
            session = %self.token,
            "Write timed out, abandoning channel"
        );
        self.close().await;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("token", &self.token)
            .field("online", &self.is_online())
            .field("broken", &self.is_broken())
            .finish()
    }
}
