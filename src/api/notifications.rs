//! Notification API endpoints.

use axum::extract::{Path, Query, State};

use super::{error, success, ApiResult, ViewerQuery};
use crate::models::Notification;
use crate::AppState;

/// GET /api/notifications?userId= - Notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(viewer): Query<ViewerQuery>,
) -> ApiResult<Vec<Notification>> {
    match state.repo.list_notifications(&viewer.user_id).await {
        Ok(notifications) => success(notifications),
        Err(e) => error(e),
    }
}

/// POST /api/notifications/:id/read - Mark one notification read.
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Notification> {
    match state.repo.mark_notification_read(&id).await {
        Ok(notification) => success(notification),
        Err(e) => error(e),
    }
}

/// POST /api/notifications/read-all?userId= - Mark everything read.
/// Returns the number of flipped notifications.
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    Query(viewer): Query<ViewerQuery>,
) -> ApiResult<u64> {
    match state
        .repo
        .mark_all_notifications_read(&viewer.user_id)
        .await
    {
        Ok(flipped) => success(flipped),
        Err(e) => error(e),
    }
}

/// DELETE /api/notifications/:id - Remove a notification.
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    match state.repo.delete_notification(&id).await {
        Ok(()) => success(()),
        Err(e) => error(e),
    }
}
