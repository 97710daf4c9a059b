//! Profile API endpoints, including the ranked match listing.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::matching::{self, MatchCriteria};
use crate::models::{CreateProfileRequest, Profile, UpdateProfileRequest};
use crate::AppState;

/// GET /api/profiles - List all active profiles.
pub async fn list_profiles(State(state): State<AppState>) -> ApiResult<Vec<Profile>> {
    match state.repo.list_profiles().await {
        Ok(profiles) => success(profiles.into_iter().filter(|p| p.active).collect()),
        Err(e) => error(e),
    }
}

/// GET /api/profiles/:id - Get a single profile.
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Profile> {
    match state.repo.get_profile(&id).await {
        Ok(Some(profile)) => success(profile),
        Ok(None) => error(AppError::NotFound(format!("Profile {} not found", id))),
        Err(e) => error(e),
    }
}

/// POST /api/profiles - Create a new profile.
pub async fn create_profile(
    State(state): State<AppState>,
    Json(request): Json<CreateProfileRequest>,
) -> ApiResult<Profile> {
    // Validate required fields
    if request.name.trim().is_empty() {
        return error(AppError::Validation("Name is required".to_string()));
    }

    match state.repo.create_profile(&request).await {
        Ok(profile) => success(profile),
        Err(e) => error(e),
    }
}

/// PUT /api/profiles/:id - Update a profile.
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<Profile> {
    if let Some(name) = &request.name {
        if name.trim().is_empty() {
            return error(AppError::Validation("Name cannot be empty".to_string()));
        }
    }

    match state.repo.update_profile(&id, &request).await {
        Ok(profile) => success(profile),
        Err(e) => error(e),
    }
}

/// DELETE /api/profiles/:id - Deactivate a profile.
///
/// Profiles are referenced by swaps, messages and ratings, so deletion is a
/// flag flip rather than a hard delete.
pub async fn delete_profile(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    match state.repo.deactivate_profile(&id).await {
        Ok(()) => success(()),
        Err(e) => error(e),
    }
}

/// Query parameters of the match listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub skill: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub min_rating: Option<f64>,
    #[serde(default)]
    pub categories: Option<String>,
    /// Maximum number of results (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

/// Maximum number of match results allowed.
const MAX_MATCH_LIMIT: usize = 100;

/// Ranked candidate page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub results: Vec<Profile>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// GET /api/profiles/:id/matches - Ranked, filtered candidates for a viewer.
pub async fn get_matches(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<MatchQuery>,
) -> ApiResult<MatchResponse> {
    let viewer = match state.repo.get_profile(&id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => return error(AppError::NotFound(format!("Profile {} not found", id))),
        Err(e) => return error(e),
    };

    let candidates = match state.repo.list_profiles().await {
        Ok(profiles) => profiles
            .into_iter()
            .filter(|p| p.active && p.is_public)
            .collect::<Vec<_>>(),
        Err(e) => return error(e),
    };

    let criteria = MatchCriteria {
        q: params.q,
        availability: params.availability,
        skill: params.skill,
        location: params.location,
        min_rating: params.min_rating,
        categories: params.categories,
    };

    let ranked = matching::rank(candidates, &viewer, &criteria);
    let total = ranked.len();
    let limit = params.limit.min(MAX_MATCH_LIMIT);
    let results = ranked
        .into_iter()
        .skip(params.offset)
        .take(limit)
        .collect();

    success(MatchResponse {
        results,
        total,
        limit,
        offset: params.offset,
    })
}
