//! SkillSwap backend: REST + WebSocket service for a peer-to-peer skill
//! exchange application, with candidate matching, room-scoped real-time
//! delivery and a reconnecting client channel.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod matching;
pub mod models;
pub mod realtime;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use db::Repository;
use realtime::Hub;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub hub: Arc<Hub>,
    pub config: Arc<Config>,
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Profiles
        .route("/profiles", get(api::list_profiles))
        .route("/profiles", post(api::create_profile))
        .route("/profiles/{id}", get(api::get_profile))
        .route("/profiles/{id}", put(api::update_profile))
        .route("/profiles/{id}", delete(api::delete_profile))
        .route("/profiles/{id}/matches", get(api::get_matches))
        // Skills
        .route("/skills", get(api::list_skills))
        .route("/skills", post(api::create_skill))
        .route("/skills/categories", get(api::skill_categories))
        .route("/skills/popular", get(api::popular_skills))
        // Swap requests
        .route("/swap-requests", get(api::list_swaps))
        .route("/swap-requests", post(api::create_swap))
        .route("/swap-requests/{id}", get(api::get_swap))
        .route("/swap-requests/{id}", put(api::update_swap))
        .route("/swap-requests/{id}", delete(api::delete_swap))
        // Conversations and messages
        .route("/conversations", get(api::list_conversations))
        .route("/conversations/{id}/messages", get(api::list_messages))
        .route("/conversations/{id}/read", post(api::mark_conversation_read))
        .route("/messages", post(api::send_message))
        // Ratings
        .route("/ratings", post(api::create_rating))
        .route("/ratings/users/{id}", get(api::list_user_ratings))
        // Notifications
        .route("/notifications", get(api::list_notifications))
        .route("/notifications/read-all", post(api::mark_all_notifications_read))
        .route("/notifications/{id}/read", post(api::mark_notification_read))
        .route("/notifications/{id}", delete(api::delete_notification))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // The socket endpoint authenticates with its own bearer token, not the PSK.
    let ws_routes = Router::new().route("/ws", get(realtime::ws_handler));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(ws_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
