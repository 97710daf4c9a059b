//! Skill catalog model.

use serde::{Deserialize, Serialize};

/// A skill in the shared catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: String,
}

/// A catalog skill together with how many profiles currently offer it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillWithStats {
    #[serde(flatten)]
    pub skill: Skill,
    pub offered_count: usize,
}

/// Request body for adding a skill to the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSkillRequest {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
}
