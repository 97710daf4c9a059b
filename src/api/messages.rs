//! Conversation and message API endpoints.
//!
//! The REST send path mirrors the socket `send_message` command so offline
//! clients and tests share one delivery routine.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;

use super::{error, success, ApiResult, ViewerQuery};
use crate::errors::AppError;
use crate::models::{ConversationSummary, Message, SendMessageRequest};
use crate::realtime;
use crate::AppState;

/// GET /api/conversations?userId= - Conversations with per-viewer unread counts.
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(viewer): Query<ViewerQuery>,
) -> ApiResult<Vec<ConversationSummary>> {
    match state.repo.list_conversations(&viewer.user_id).await {
        Ok(conversations) => success(conversations),
        Err(e) => error(e),
    }
}

/// GET /api/conversations/:id/messages - Messages in arrival order.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Message>> {
    match state.repo.get_conversation(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => return error(AppError::NotFound(format!("Conversation {} not found", id))),
        Err(e) => return error(e),
    }

    match state.repo.list_messages(&id).await {
        Ok(messages) => success(messages),
        Err(e) => error(e),
    }
}

/// POST /api/conversations/:id/read?userId= - Mark everything addressed to
/// the viewer as read. Returns the number of flipped messages.
pub async fn mark_conversation_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(viewer): Query<ViewerQuery>,
) -> ApiResult<u64> {
    match state.repo.get_conversation(&id).await {
        Ok(Some(conversation)) => {
            if conversation.user_a != viewer.user_id && conversation.user_b != viewer.user_id {
                return error(AppError::Forbidden(
                    "Not a participant of this conversation".to_string(),
                ));
            }
        }
        Ok(None) => return error(AppError::NotFound(format!("Conversation {} not found", id))),
        Err(e) => return error(e),
    }

    match state
        .repo
        .mark_conversation_read(&id, &viewer.user_id)
        .await
    {
        Ok(flipped) => success(flipped),
        Err(e) => error(e),
    }
}

/// POST /api/messages - REST fallback for sending a direct message.
pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<Message> {
    if request.content.trim().is_empty() {
        return error(AppError::Validation(
            "Message content is required".to_string(),
        ));
    }
    if request.sender_id == request.recipient_id {
        return error(AppError::Validation(
            "Cannot message yourself".to_string(),
        ));
    }
    for id in [&request.sender_id, &request.recipient_id] {
        match state.repo.get_profile(id).await {
            Ok(Some(_)) => {}
            Ok(None) => return error(AppError::NotFound(format!("Profile {} not found", id))),
            Err(e) => return error(e),
        }
    }

    let timestamp = Utc::now().to_rfc3339();
    match realtime::deliver_message(
        &state,
        &request.sender_id,
        &request.recipient_id,
        &request.content,
        &timestamp,
    )
    .await
    {
        Ok(message) => success(message),
        Err(e) => error(e),
    }
}
