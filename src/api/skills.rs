//! Skill catalog API endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateSkillRequest, Skill, SkillWithStats};
use crate::AppState;

/// Query parameters for the skill listing.
#[derive(Debug, Deserialize)]
pub struct SkillsQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// GET /api/skills - List catalog skills, optionally filtered.
pub async fn list_skills(
    State(state): State<AppState>,
    Query(params): Query<SkillsQuery>,
) -> ApiResult<Vec<Skill>> {
    match state
        .repo
        .list_skills(params.q.as_deref(), params.category.as_deref())
        .await
    {
        Ok(skills) => success(skills),
        Err(e) => error(e),
    }
}

/// POST /api/skills - Add a skill to the catalog.
pub async fn create_skill(
    State(state): State<AppState>,
    Json(request): Json<CreateSkillRequest>,
) -> ApiResult<Skill> {
    if request.name.trim().is_empty() {
        return error(AppError::Validation("Skill name is required".to_string()));
    }
    if request.category.trim().is_empty() {
        return error(AppError::Validation("Category is required".to_string()));
    }

    match state.repo.create_skill(&request).await {
        Ok(skill) => success(skill),
        Err(e) => error(e),
    }
}

/// GET /api/skills/categories - Distinct category list.
pub async fn skill_categories(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    match state.repo.skill_categories().await {
        Ok(categories) => success(categories),
        Err(e) => error(e),
    }
}

/// Query parameters for the popular-skill listing.
#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    #[serde(default = "default_popular_limit")]
    pub limit: usize,
}

fn default_popular_limit() -> usize {
    10
}

/// GET /api/skills/popular - Skills ranked by how many profiles offer them.
pub async fn popular_skills(
    State(state): State<AppState>,
    Query(params): Query<PopularQuery>,
) -> ApiResult<Vec<SkillWithStats>> {
    match state.repo.popular_skills(params.limit).await {
        Ok(skills) => success(skills),
        Err(e) => error(e),
    }
}
