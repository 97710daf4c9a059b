//! Profile model matching the frontend UserProfile interface.

use serde::{Deserialize, Serialize};

/// Availability window a user advertises on their profile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Weekdays,
    Weekends,
    Evenings,
    Mornings,
    Flexible,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Weekdays => "weekdays",
            Availability::Weekends => "weekends",
            Availability::Evenings => "evenings",
            Availability::Mornings => "mornings",
            Availability::Flexible => "flexible",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "weekdays" => Some(Availability::Weekdays),
            "weekends" => Some(Availability::Weekends),
            "evenings" => Some(Availability::Evenings),
            "mornings" => Some(Availability::Mornings),
            "flexible" => Some(Availability::Flexible),
            _ => None,
        }
    }

    /// Two windows are compatible when they are equal or either side is flexible.
    pub fn compatible_with(self, other: Availability) -> bool {
        self == other || self == Availability::Flexible || other == Availability::Flexible
    }
}

/// A user's public-facing record of offered/wanted skills and reputation signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub skills_offered: Vec<String>,
    #[serde(default)]
    pub skills_wanted: Vec<String>,
    /// Running average over received ratings, 0.0 to 5.0.
    #[serde(default)]
    pub rating: f64,
    pub availability: Availability,
    pub is_public: bool,
    pub is_online: bool,
    pub last_seen: String,
    #[serde(default)]
    pub completed_swaps: i64,
    #[serde(default)]
    pub badges: Vec<String>,
    pub joined_date: String,
    /// Deactivated profiles are hidden from matching but never hard-deleted.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Compatibility score relative to a specific viewer, 0 to 100.
    /// Only populated by the matching pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_score: Option<u8>,
}

fn default_active() -> bool {
    true
}

/// Request body for creating a new profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub skills_offered: Vec<String>,
    #[serde(default)]
    pub skills_wanted: Vec<String>,
    #[serde(default = "default_availability")]
    pub availability: Availability,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_availability() -> Availability {
    Availability::Flexible
}

fn default_public() -> bool {
    true
}

/// Request body for updating an existing profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub skills_offered: Option<Vec<String>>,
    #[serde(default)]
    pub skills_wanted: Option<Vec<String>>,
    #[serde(default)]
    pub availability: Option<Availability>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub badges: Option<Vec<String>>,
}
