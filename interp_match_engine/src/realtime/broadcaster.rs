use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use log::*;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

use crate::{
    order_objects::ExceptionNotice,
    realtime::{EventCache, RealtimeEvent, UserRoleId},
};

//--------------------------------------    SessionRegistry    -------------------------------------------------------
/// The registry of connected websocket sessions, keyed by user role. The transport layer registers a sender per
/// connection; the broadcaster fans published payloads out to them. Several connections may serve the same user.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<UserRoleId, Vec<SessionHandle>>>>,
    next_id: Arc<AtomicU64>,
}

#[derive(Clone)]
pub struct SessionHandle {
    pub id: u64,
    sender: mpsc::Sender<String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection for the user role and returns its session id, for use with `deregister`.
    pub async fn register(&self, role: &UserRoleId, sender: mpsc::Sender<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = SessionHandle { id, sender };
        self.sessions.write().await.entry(role.clone()).or_default().push(handle);
        debug!("🔌️ Session {id} registered for {role}");
        id
    }

    pub async fn deregister(&self, role: &UserRoleId, session_id: u64) {
        let mut sessions = self.sessions.write().await;
        if let Some(handles) = sessions.get_mut(role) {
            handles.retain(|h| h.id != session_id);
            if handles.is_empty() {
                sessions.remove(role);
            }
        }
        debug!("🔌️ Session {session_id} deregistered for {role}");
    }

    /// Drops every connection for the user role. Returns the number of sessions removed.
    pub async fn drop_user(&self, role: &UserRoleId) -> usize {
        self.sessions.write().await.remove(role).map(|v| v.len()).unwrap_or(0)
    }

    pub async fn sessions_for(&self, role: &UserRoleId) -> Vec<SessionHandle> {
        self.sessions.read().await.get(role).cloned().unwrap_or_default()
    }

    pub async fn connection_count(&self) -> usize {
        self.sessions.read().await.values().map(Vec::len).sum()
    }
}

//--------------------------------------  RealtimeBroadcaster  -------------------------------------------------------
/// Publishes state deltas to connected sessions and keeps the [`EventCache`] current, so a client reconnecting
/// before the next event can fetch the last known state. Delivery is at-least-once from the caller's perspective:
/// a failed session send is surfaced on that user's `exception` channel and never fails the publish.
#[derive(Clone)]
pub struct RealtimeBroadcaster {
    registry: SessionRegistry,
    cache: EventCache,
}

/// The envelope written to the wire and to the cache.
#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    event: &'a str,
    payload: &'a T,
}

impl RealtimeBroadcaster {
    pub fn new(registry: SessionRegistry, cache: EventCache) -> Self {
        Self { registry, cache }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &EventCache {
        &self.cache
    }

    /// Serialises the payload once, updates the cache entry for (role, event) and pushes the envelope to every
    /// connected session of the user role.
    pub async fn publish<T: Serialize>(
        &self,
        role: &UserRoleId,
        event: RealtimeEvent,
        payload: &T,
    ) -> Result<(), RealtimeError> {
        let json = serde_json::to_string(&Envelope { event: event.as_str(), payload })
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
        self.cache.put(role, event, &json).await;
        let failures = self.push_to_sessions(role, &json).await;
        if failures > 0 && event != RealtimeEvent::Exception {
            let notice = ExceptionNotice::new(format!("{failures} session(s) missed a {event} update"));
            if let Ok(exception) =
                serde_json::to_string(&Envelope { event: RealtimeEvent::Exception.as_str(), payload: &notice })
            {
                self.cache.put(role, RealtimeEvent::Exception, &exception).await;
                self.push_to_sessions(role, &exception).await;
            }
        }
        Ok(())
    }

    /// The most recent cached payload for (role, event), for reconnect recovery.
    pub async fn latest(&self, role: &UserRoleId, event: RealtimeEvent) -> Option<String> {
        self.cache.latest(role, event).await
    }

    /// Invoked on logout/session termination: drops the user's connections and pattern-deletes their cache entries.
    pub async fn clear_user(&self, role: &UserRoleId) -> usize {
        let dropped = self.registry.drop_user(role).await;
        let cleared = self.cache.clear_user(role).await;
        debug!("🔌️ Cleared user {role}: {dropped} session(s) dropped, {cleared} cache entrie(s) removed");
        cleared
    }

    async fn push_to_sessions(&self, role: &UserRoleId, json: &str) -> usize {
        let mut failures = 0;
        for session in self.registry.sessions_for(role).await {
            if let Err(e) = session.sender.send(json.to_string()).await {
                warn!("🔌️ Failed to push event to session {} of {role}: {e}", session.id);
                failures += 1;
            }
        }
        failures
    }
}

#[derive(Debug, Clone, Error)]
pub enum RealtimeError {
    #[error("Could not serialise realtime payload: {0}")]
    SerializationError(String),
}
