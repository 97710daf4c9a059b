//! Rating API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::swaps::notify;
use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateRatingRequest, NewNotification, NotificationKind, Rating};
use crate::AppState;

/// POST /api/ratings - Rate the other participant of a completed swap.
pub async fn create_rating(
    State(state): State<AppState>,
    Json(request): Json<CreateRatingRequest>,
) -> ApiResult<Rating> {
    if !(1..=5).contains(&request.rating) {
        return error(AppError::Validation(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    let rating = match state.repo.create_rating(&request).await {
        Ok(rating) => rating,
        Err(e) => return error(e),
    };

    notify(
        &state,
        &rating.rated_id,
        NewNotification {
            user_id: rating.rated_id.clone(),
            kind: NotificationKind::System,
            title: "New rating received".to_string(),
            description: format!("You received a {}-star rating", rating.stars),
            ref_user_id: Some(rating.rater_id.clone()),
        },
    )
    .await;

    success(rating)
}

/// GET /api/ratings/users/:id - Ratings received by a user.
pub async fn list_user_ratings(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Rating>> {
    match state.repo.list_ratings_for_user(&id).await {
        Ok(ratings) => success(ratings),
        Err(e) => error(e),
    }
}
