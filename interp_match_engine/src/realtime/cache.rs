use std::{collections::HashMap, sync::Arc};

use log::trace;
use tokio::sync::RwLock;

use crate::realtime::{RealtimeEvent, UserRoleId};

/// The per-(user role, event type) cache of the most recent serialized payload.
///
/// Keys follow the `wsCache:{userRoleId}:{eventType}` layout. Writes are idempotent last-writer-wins overwrites;
/// only the latest state matters for reconnect recovery. Entries are removed by the pattern delete in
/// [`EventCache::clear_user`], nothing else.
#[derive(Clone, Default)]
pub struct EventCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

fn cache_key(role: &UserRoleId, event: RealtimeEvent) -> String {
    format!("wsCache:{role}:{event}")
}

fn user_prefix(role: &UserRoleId) -> String {
    format!("wsCache:{role}:")
}

impl EventCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, role: &UserRoleId, event: RealtimeEvent, payload: &str) {
        let key = cache_key(role, event);
        trace!("🗂️ Caching latest payload for {key}");
        self.entries.write().await.insert(key, payload.to_string());
    }

    /// The most recent payload for the given (user role, event type), if any was ever published.
    pub async fn latest(&self, role: &UserRoleId, event: RealtimeEvent) -> Option<String> {
        self.entries.read().await.get(&cache_key(role, event)).cloned()
    }

    /// Pattern-deletes every entry for the user role. Called on logout/session end to bound memory.
    /// Returns the number of entries removed.
    pub async fn clear_user(&self, role: &UserRoleId) -> usize {
        let prefix = user_prefix(role);
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&prefix));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn last_writer_wins() {
        let cache = EventCache::new();
        let role = UserRoleId::client("alice");
        cache.put(&role, RealtimeEvent::NewAppointmentOrders, "one").await;
        cache.put(&role, RealtimeEvent::NewAppointmentOrders, "two").await;
        assert_eq!(cache.latest(&role, RealtimeEvent::NewAppointmentOrders).await.as_deref(), Some("two"));
        assert_eq!(cache.latest(&role, RealtimeEvent::LiveSessions).await, None);
    }

    #[tokio::test]
    async fn clear_user_is_a_pattern_delete() {
        let cache = EventCache::new();
        let alice = UserRoleId::client("alice");
        let bob = UserRoleId::client("bob");
        cache.put(&alice, RealtimeEvent::NewAppointmentOrders, "a1").await;
        cache.put(&alice, RealtimeEvent::LiveSessions, "a2").await;
        cache.put(&bob, RealtimeEvent::NewAppointmentOrders, "b1").await;
        assert_eq!(cache.clear_user(&alice).await, 2);
        assert_eq!(cache.latest(&alice, RealtimeEvent::NewAppointmentOrders).await, None);
        assert_eq!(cache.latest(&bob, RealtimeEvent::NewAppointmentOrders).await.as_deref(), Some("b1"));
        assert_eq!(cache.len().await, 1);
    }
}
