//! Swap request API endpoints.
//!
//! Status transitions enforce the actor rules; every mutation is mirrored to
//! the affected users over the real-time channel.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{error, success, ApiResult, ViewerQuery};
use crate::errors::AppError;
use crate::models::{
    CreateSwapRequest, NewNotification, NotificationKind, SwapRequest, SwapStatus,
    UpdateSwapRequest,
};
use crate::realtime::ServerEvent;
use crate::AppState;

/// GET /api/swap-requests?userId= - Requests the user is involved in.
pub async fn list_swaps(
    State(state): State<AppState>,
    Query(viewer): Query<ViewerQuery>,
) -> ApiResult<Vec<SwapRequest>> {
    match state.repo.list_swaps_for_user(&viewer.user_id).await {
        Ok(swaps) => success(swaps),
        Err(e) => error(e),
    }
}

/// GET /api/swap-requests/:id - Get a single request, participants only.
pub async fn get_swap(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(viewer): Query<ViewerQuery>,
) -> ApiResult<SwapRequest> {
    match state.repo.get_swap(&id).await {
        Ok(Some(swap)) => {
            if !swap.involves(&viewer.user_id) {
                return error(AppError::Forbidden(
                    "Not authorized to view this request".to_string(),
                ));
            }
            success(swap)
        }
        Ok(None) => error(AppError::NotFound(format!("Swap request {} not found", id))),
        Err(e) => error(e),
    }
}

/// POST /api/swap-requests - Submit a new swap request.
pub async fn create_swap(
    State(state): State<AppState>,
    Json(request): Json<CreateSwapRequest>,
) -> ApiResult<SwapRequest> {
    if request.requester_id == request.provider_id {
        return error(AppError::Validation(
            "Cannot request a swap with yourself".to_string(),
        ));
    }
    if request.offered_skill.trim().is_empty() || request.requested_skill.trim().is_empty() {
        return error(AppError::Validation(
            "Offered and requested skills are required".to_string(),
        ));
    }

    let swap = match state.repo.create_swap(&request).await {
        Ok(swap) => swap,
        Err(e) => return error(e),
    };

    // Let the provider know, both on the feed and live.
    let requester_name = match state.repo.get_profile(&swap.requester_id).await {
        Ok(Some(profile)) => profile.name,
        _ => swap.requester_id.clone(),
    };
    notify(
        &state,
        &swap.provider_id,
        NewNotification {
            user_id: swap.provider_id.clone(),
            kind: NotificationKind::Request,
            title: "New swap request".to_string(),
            description: format!(
                "{} wants to trade {} for {}",
                requester_name, swap.offered_skill, swap.requested_skill
            ),
            ref_user_id: Some(swap.requester_id.clone()),
        },
    )
    .await;
    state
        .hub
        .send_to_user(&swap.provider_id, ServerEvent::SwapRequest(swap.clone()))
        .await;

    success(swap)
}

/// PUT /api/swap-requests/:id - Drive a status transition.
pub async fn update_swap(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateSwapRequest>,
) -> ApiResult<SwapRequest> {
    let Some(next) = SwapStatus::from_str(&request.status) else {
        return error(AppError::Validation(format!(
            "Unknown status {}",
            request.status
        )));
    };

    let swap = match state
        .repo
        .transition_swap(&id, next, &request.user_id)
        .await
    {
        Ok(swap) => swap,
        Err(e) => return error(e),
    };

    // The counterpart of whoever acted hears about the change.
    let counterpart = if request.user_id == swap.requester_id {
        swap.provider_id.clone()
    } else {
        swap.requester_id.clone()
    };
    let title = match next {
        SwapStatus::Accepted => "Swap request accepted",
        SwapStatus::Declined => "Swap request declined",
        SwapStatus::Completed => "Swap completed",
        SwapStatus::Cancelled => "Swap request cancelled",
        SwapStatus::Pending => "Swap request updated",
    };
    notify(
        &state,
        &counterpart,
        NewNotification {
            user_id: counterpart.clone(),
            kind: NotificationKind::Request,
            title: title.to_string(),
            description: format!("{} for {}", swap.offered_skill, swap.requested_skill),
            ref_user_id: Some(request.user_id.clone()),
        },
    )
    .await;
    for participant in [&swap.requester_id, &swap.provider_id] {
        state
            .hub
            .send_to_user(participant, ServerEvent::SwapRequest(swap.clone()))
            .await;
    }

    success(swap)
}

/// DELETE /api/swap-requests/:id?userId= - Requester-only delete.
pub async fn delete_swap(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(viewer): Query<ViewerQuery>,
) -> ApiResult<()> {
    match state.repo.delete_swap(&id, &viewer.user_id).await {
        Ok(()) => success(()),
        Err(e) => error(e),
    }
}

/// Persist a notification and push it when the user is online. Delivery
/// failures only get logged; the triggering mutation already succeeded.
pub(super) async fn notify(state: &AppState, user_id: &str, new: NewNotification) {
    match state.repo.create_notification(&new).await {
        Ok(notification) => {
            state
                .hub
                .send_to_user(user_id, ServerEvent::Notification(notification))
                .await;
        }
        Err(err) => {
            tracing::warn!(user_id, "failed to store notification: {}", err);
        }
    }
}
