//! Conversation and message models.

use serde::{Deserialize, Serialize};

/// A two-party conversation. Participants are stored in sorted order so the
/// pair (a, b) and (b, a) resolve to the same row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_time: Option<String>,
    pub created_at: String,
}

impl Conversation {
    /// The participant that is not `viewer`.
    pub fn peer_of(&self, viewer: &str) -> &str {
        if self.user_a == viewer {
            &self.user_b
        } else {
            &self.user_a
        }
    }
}

/// Normalize a participant pair into sorted order.
pub fn participant_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// A conversation as seen by one participant, with the unread count computed
/// from messages addressed to them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub peer_id: String,
    pub peer_name: String,
    pub peer_online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_time: Option<String>,
    pub unread_count: i64,
}

/// A single direct message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub timestamp: String,
    pub is_read: bool,
}

/// Request body for sending a message over REST (the socket path carries the
/// same fields in its `send_message` command).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_pair_is_order_independent() {
        assert_eq!(participant_pair("bob", "alice"), ("alice", "bob"));
        assert_eq!(participant_pair("alice", "bob"), ("alice", "bob"));
    }

    #[test]
    fn test_peer_of() {
        let convo = Conversation {
            id: "c1".to_string(),
            user_a: "alice".to_string(),
            user_b: "bob".to_string(),
            last_message: None,
            last_message_time: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        };
        assert_eq!(convo.peer_of("alice"), "bob");
        assert_eq!(convo.peer_of("bob"), "alice");
    }
}
