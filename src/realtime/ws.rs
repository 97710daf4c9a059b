//! WebSocket endpoint wiring connected clients to the hub.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::{
    conversation_room, ClientCommand, PresenceStatus, PresenceUpdate, ServerEvent, TypingIndicator,
};
use crate::auth;
use crate::models::{NewNotification, NotificationKind};
use crate::AppState;

/// Query parameters of the upgrade request. The bearer token travels in the
/// query string because browser WebSocket clients cannot set headers.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// GET /ws - upgrade to the real-time channel.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    // The auth service owns signature verification; the expiry claim alone
    // decides whether this credential is worth a handshake.
    if auth::token_is_expired(&query.token) {
        return (StatusCode::UNAUTHORIZED, "token expired").into_response();
    }

    match state.repo.get_profile(&query.user_id).await {
        Ok(Some(_)) => {}
        _ => return (StatusCode::UNAUTHORIZED, "unknown user").into_response(),
    }

    let user_id = query.user_id;
    ws.on_upgrade(move |socket| handle_socket(state, user_id, socket))
}

async fn handle_socket(state: AppState, user_id: String, socket: WebSocket) {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.hub.register(&user_id, event_tx).await;

    let now = Utc::now().to_rfc3339();
    if let Err(err) = state.repo.set_presence(&user_id, true, &now).await {
        tracing::warn!("failed to persist presence for {}: {}", user_id, err);
    }
    state
        .hub
        .broadcast_all(
            &ServerEvent::UserStatus(PresenceUpdate {
                user_id: user_id.clone(),
                status: PresenceStatus::Online,
                last_seen: None,
            }),
            Some(&user_id),
        )
        .await;

    tracing::info!("realtime session opened for {}", user_id);

    let (mut sink, mut stream) = socket.split();

    // Outbound pump: hub events to the socket.
    let send_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(WsMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound pump: client commands to the hub.
    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            WsMessage::Text(text) => {
                let Ok(command) = serde_json::from_str::<ClientCommand>(text.as_str()) else {
                    tracing::debug!("ignoring malformed command from {}", user_id);
                    continue;
                };
                handle_command(&state, &user_id, command).await;
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    send_task.abort();

    state.hub.unregister(&user_id).await;
    let last_seen = Utc::now().to_rfc3339();
    if let Err(err) = state.repo.set_presence(&user_id, false, &last_seen).await {
        tracing::warn!("failed to persist presence for {}: {}", user_id, err);
    }
    state
        .hub
        .broadcast_all(
            &ServerEvent::UserStatus(PresenceUpdate {
                user_id: user_id.clone(),
                status: PresenceStatus::Offline,
                last_seen: Some(last_seen),
            }),
            Some(&user_id),
        )
        .await;

    tracing::info!("realtime session closed for {}", user_id);
}

async fn handle_command(state: &AppState, user_id: &str, command: ClientCommand) {
    match command {
        ClientCommand::JoinRoom { room } => {
            state.hub.join(user_id, &room).await;
        }
        ClientCommand::LeaveRoom { room } => {
            state.hub.leave(user_id, &room).await;
        }
        ClientCommand::SendMessage {
            recipient_id,
            content,
            timestamp,
        } => {
            if content.trim().is_empty() || recipient_id == user_id {
                return;
            }
            let timestamp = if timestamp.is_empty() {
                Utc::now().to_rfc3339()
            } else {
                timestamp
            };

            if let Err(err) =
                deliver_message(state, user_id, &recipient_id, &content, &timestamp).await
            {
                tracing::warn!("failed to deliver message from {}: {}", user_id, err);
            }
        }
        ClientCommand::UserStatus { status } => {
            let last_seen = match status {
                PresenceStatus::Offline => Some(Utc::now().to_rfc3339()),
                _ => None,
            };
            state
                .hub
                .broadcast_all(
                    &ServerEvent::UserStatus(PresenceUpdate {
                        user_id: user_id.to_string(),
                        status,
                        last_seen,
                    }),
                    Some(user_id),
                )
                .await;
        }
        ClientCommand::TypingStart { conversation_id } => {
            relay_typing(state, user_id, &conversation_id, true).await;
        }
        ClientCommand::TypingStop { conversation_id } => {
            relay_typing(state, user_id, &conversation_id, false).await;
        }
    }
}

/// Persist a direct message, fan it out to the conversation room, and leave
/// the recipient a notification. Shared by the socket command and the REST
/// fallback.
pub async fn deliver_message(
    state: &AppState,
    sender_id: &str,
    recipient_id: &str,
    content: &str,
    timestamp: &str,
) -> Result<crate::models::Message, crate::errors::AppError> {
    let (message, conversation) = state
        .repo
        .send_message(sender_id, recipient_id, content, timestamp)
        .await?;

    state
        .hub
        .broadcast_room(
            &conversation_room(&conversation.id),
            &ServerEvent::NewMessage(message.clone()),
            Some(sender_id),
        )
        .await;

    // The recipient gets a notification even when the chat view (and
    // therefore the room) is closed.
    let sender_name = match state.repo.get_profile(sender_id).await {
        Ok(Some(profile)) => profile.name,
        _ => sender_id.to_string(),
    };
    let notification = state
        .repo
        .create_notification(&NewNotification {
            user_id: recipient_id.to_string(),
            kind: NotificationKind::Message,
            title: format!("New message from {}", sender_name),
            description: preview(&message.content),
            ref_user_id: Some(sender_id.to_string()),
        })
        .await?;
    state
        .hub
        .send_to_user(recipient_id, ServerEvent::Notification(notification))
        .await;

    Ok(message)
}

async fn relay_typing(state: &AppState, user_id: &str, conversation_id: &str, is_typing: bool) {
    let username = match state.repo.get_profile(user_id).await {
        Ok(Some(profile)) => profile.name,
        _ => user_id.to_string(),
    };
    state
        .hub
        .broadcast_room(
            &conversation_room(conversation_id),
            &ServerEvent::Typing(TypingIndicator {
                user_id: user_id.to_string(),
                username,
                conversation_id: conversation_id.to_string(),
                is_typing,
            }),
            Some(user_id),
        )
        .await;
}

fn preview(content: &str) -> String {
    const PREVIEW_LEN: usize = 80;
    if content.chars().count() <= PREVIEW_LEN {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(PREVIEW_LEN).collect();
        format!("{}...", truncated)
    }
}
