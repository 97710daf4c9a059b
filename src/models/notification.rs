//! Notification model.

use serde::{Deserialize, Serialize};

/// Classification of a notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Request,
    Message,
    Match,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Request => "request",
            NotificationKind::Message => "message",
            NotificationKind::Match => "match",
            NotificationKind::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "request" => Some(NotificationKind::Request),
            "message" => Some(NotificationKind::Message),
            "match" => Some(NotificationKind::Match),
            "system" => Some(NotificationKind::System),
            _ => None,
        }
    }
}

/// A user-scoped notification, persisted server-side and pushed over the
/// real-time channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
    pub timestamp: String,
    pub is_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_user_id: Option<String>,
}

/// Fields needed to record a new notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
    pub ref_user_id: Option<String>,
}
