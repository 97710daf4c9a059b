//! Swap request model and its status machine.

use serde::{Deserialize, Serialize};

/// Lifecycle of a swap request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    Pending,
    Accepted,
    Declined,
    Completed,
    Cancelled,
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Pending => "pending",
            SwapStatus::Accepted => "accepted",
            SwapStatus::Declined => "declined",
            SwapStatus::Completed => "completed",
            SwapStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SwapStatus::Pending),
            "accepted" => Some(SwapStatus::Accepted),
            "declined" => Some(SwapStatus::Declined),
            "completed" => Some(SwapStatus::Completed),
            "cancelled" => Some(SwapStatus::Cancelled),
            _ => None,
        }
    }

    /// Legal edges: pending -> accepted/declined/cancelled,
    /// accepted -> completed/cancelled. Everything else is a conflict.
    pub fn can_transition(self, next: SwapStatus) -> bool {
        matches!(
            (self, next),
            (SwapStatus::Pending, SwapStatus::Accepted)
                | (SwapStatus::Pending, SwapStatus::Declined)
                | (SwapStatus::Pending, SwapStatus::Cancelled)
                | (SwapStatus::Accepted, SwapStatus::Cancelled)
                | (SwapStatus::Accepted, SwapStatus::Completed)
        )
    }
}

/// A proposal to exchange one offered skill for one wanted skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub id: String,
    pub requester_id: String,
    pub provider_id: String,
    pub offered_skill: String,
    pub requested_skill: String,
    pub status: SwapStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_schedule: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl SwapRequest {
    pub fn involves(&self, user_id: &str) -> bool {
        self.requester_id == user_id || self.provider_id == user_id
    }

    /// Whether `actor` is allowed to drive this request to `next`.
    /// Only the provider accepts or declines; only the requester cancels;
    /// either participant completes an accepted swap.
    pub fn actor_may(&self, actor: &str, next: SwapStatus) -> bool {
        match next {
            SwapStatus::Accepted | SwapStatus::Declined => self.provider_id == actor,
            SwapStatus::Cancelled => self.requester_id == actor,
            SwapStatus::Completed => self.involves(actor),
            SwapStatus::Pending => false,
        }
    }
}

/// Request body for submitting a new swap request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSwapRequest {
    pub requester_id: String,
    pub provider_id: String,
    pub offered_skill: String,
    pub requested_skill: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub proposed_schedule: Option<serde_json::Value>,
}

/// Request body for a status transition on an existing swap request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSwapRequest {
    pub status: String,
    /// Acting user, as established by the auth collaborator.
    pub user_id: String,
}
