//! Real-time subsystem: typed event vocabulary, the server-side hub and its
//! WebSocket endpoint, and the reconnecting client channel.

mod channel;
mod feed;
mod hub;
mod ws;

pub use channel::*;
pub use feed::*;
pub use hub::*;
pub use ws::*;

use serde::{Deserialize, Serialize};

use crate::models::{Message, Notification, SwapRequest};

/// Presence state of a user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
    Away,
}

/// Presence update payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub user_id: String,
    pub status: PresenceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

/// Typing indicator payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    pub user_id: String,
    pub username: String,
    pub conversation_id: String,
    pub is_typing: bool,
}

/// Events pushed from the server to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    SwapRequest(SwapRequest),
    NewMessage(Message),
    Notification(Notification),
    UserStatus(PresenceUpdate),
    Typing(TypingIndicator),
}

/// Commands a client sends to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    JoinRoom {
        room: String,
    },
    LeaveRoom {
        room: String,
    },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        recipient_id: String,
        content: String,
        timestamp: String,
    },
    UserStatus {
        status: PresenceStatus,
    },
    #[serde(rename_all = "camelCase")]
    TypingStart {
        conversation_id: String,
    },
    #[serde(rename_all = "camelCase")]
    TypingStop {
        conversation_id: String,
    },
}

/// Deterministic room name: a type tag plus the sorted participant ids, so
/// both sides of a conversation compute the same name.
pub fn room_name(kind: &str, identifiers: &[&str]) -> String {
    let mut ids: Vec<&str> = identifiers.to_vec();
    ids.sort_unstable();
    format!("{}_{}", kind, ids.join("_"))
}

/// Room carrying events for one conversation.
pub fn conversation_room(conversation_id: &str) -> String {
    room_name("conversation", &[conversation_id])
}
