//! Presence Registry
//!
//! Process-wide map from user ID to its live session. One entry per user:
//! registering again under the same ID replaces the previous session.
//!
//! Lookups and broadcasts share the read lock; register/unregister take the
//! write lock. The lock is never held across a channel write.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;

use crate::domain::{Outbound, Session};

#[derive(Default)]
pub struct PresenceRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for the session's user.
    /// Returns the superseded session, if any.
    pub fn register(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write();
        let previous = sessions.insert(session.user_id().to_string(), session);
        tracing::debug!(online = sessions.len(), "Session registered");
        previous
    }

    /// Remove whatever entry exists for `user_id`. Idempotent.
    pub fn unregister(&self, user_id: &str) -> Option<Arc<Session>> {
        self.sessions.write().remove(user_id)
    }

    /// Remove the entry only if it still belongs to `session`.
    ///
    /// Returns `false` when a newer session has taken over the user ID (or
    /// the entry is already gone); the newer session is left untouched.
    pub fn unregister_session(&self, session: &Session) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(session.user_id()) {
            Some(current) if current.token() == session.token() => {
                sessions.remove(session.user_id());
                tracing::debug!(online = sessions.len(), "Session unregistered");
                true
            }
            _ => false,
        }
    }

    /// The user's session, if registered and still reachable.
    pub fn lookup(&self, user_id: &str) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .get(user_id)
            .filter(|session| session.is_reachable())
            .cloned()
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.lookup(user_id).is_some()
    }

    /// Point-in-time list of online user IDs, excluding `exclude_user_id`.
    pub fn snapshot_online(&self, exclude_user_id: &str) -> Vec<String> {
        self.sessions
            .read()
            .values()
            .filter(|session| session.is_reachable() && session.user_id() != exclude_user_id)
            .map(|session| session.user_id().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Best-effort write to every online session except `exclude_user_id`.
    ///
    /// Writes run concurrently; a failed write is logged and does not affect
    /// the others. Returns the number of sessions that accepted the write.
    pub async fn broadcast(&self, outbound: &Outbound, exclude_user_id: &str) -> usize {
        let targets: Vec<Arc<Session>> = self
            .sessions
            .read()
            .values()
            .filter(|session| session.is_reachable() && session.user_id() != exclude_user_id)
            .cloned()
            .collect();

        let results = join_all(targets.iter().map(|session| async move {
            match session.send(outbound).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(
                        user_id = %session.user_id(),
                        error = %e,
                        "Broadcast write failed"
                    );
                    false
                }
            }
        }))
        .await;

        results.into_iter().filter(|delivered| *delivered).count()
    }
}
