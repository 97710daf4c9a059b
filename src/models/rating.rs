//! Rating model for completed swaps.

use serde::{Deserialize, Serialize};

/// A star rating left by one participant of a completed swap for the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    pub swap_request_id: String,
    pub rater_id: String,
    pub rated_id: String,
    /// 1 to 5 stars.
    pub stars: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub created_at: String,
}

/// Request body for submitting a rating.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRatingRequest {
    pub swap_request_id: String,
    pub rater_id: String,
    pub rated_user_id: String,
    pub rating: i64,
    #[serde(default)]
    pub feedback: Option<String>,
}
