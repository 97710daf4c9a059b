//! Server-side hub: per-user outbound senders, room membership and presence.
//!
//! The hub is transport-agnostic; the WebSocket handler registers a sender
//! per connected user and feeds inbound commands to it. One logical
//! connection per user: a new registration supersedes the previous one.

use std::collections::{HashMap, HashSet};

use tokio::sync::{mpsc, RwLock};

use super::ServerEvent;

#[derive(Default)]
struct HubInner {
    sessions: HashMap<String, mpsc::UnboundedSender<ServerEvent>>,
    rooms: HashMap<String, HashSet<String>>,
}

/// Shared real-time state, owned by `AppState`.
#[derive(Default)]
pub struct Hub {
    inner: RwLock<HubInner>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user's outbound sender, superseding any previous session.
    pub async fn register(&self, user_id: &str, tx: mpsc::UnboundedSender<ServerEvent>) {
        let mut inner = self.inner.write().await;
        if inner.sessions.insert(user_id.to_string(), tx).is_some() {
            tracing::debug!(user_id, "superseded existing realtime session");
        }
    }

    /// Drop a user's session and remove them from every room.
    pub async fn unregister(&self, user_id: &str) {
        let mut inner = self.inner.write().await;
        inner.sessions.remove(user_id);
        for members in inner.rooms.values_mut() {
            members.remove(user_id);
        }
        inner.rooms.retain(|_, members| !members.is_empty());
    }

    pub async fn join(&self, user_id: &str, room: &str) {
        let mut inner = self.inner.write().await;
        inner
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    pub async fn leave(&self, user_id: &str, room: &str) {
        let mut inner = self.inner.write().await;
        if let Some(members) = inner.rooms.get_mut(room) {
            members.remove(user_id);
            if members.is_empty() {
                inner.rooms.remove(room);
            }
        }
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        self.inner.read().await.sessions.contains_key(user_id)
    }

    /// Deliver an event to one user. Returns false when they have no session.
    pub async fn send_to_user(&self, user_id: &str, event: ServerEvent) -> bool {
        let inner = self.inner.read().await;
        match inner.sessions.get(user_id) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Multicast an event to every member of a room, optionally skipping one
    /// user (typically the originator).
    pub async fn broadcast_room(&self, room: &str, event: &ServerEvent, except: Option<&str>) {
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(room) else {
            return;
        };
        for member in members {
            if except == Some(member.as_str()) {
                continue;
            }
            if let Some(tx) = inner.sessions.get(member) {
                let _ = tx.send(event.clone());
            }
        }
    }

    /// Broadcast an event to every connected user, optionally skipping one.
    pub async fn broadcast_all(&self, event: &ServerEvent, except: Option<&str>) {
        let inner = self.inner.read().await;
        for (user_id, tx) in &inner.sessions {
            if except == Some(user_id.as_str()) {
                continue;
            }
            let _ = tx.send(event.clone());
        }
    }
}
