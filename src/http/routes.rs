use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session lifecycle
        .route("/sessions", post(handlers::join_room))
        .route("/sessions/:session_id/leave", post(handlers::leave_room))
        .route("/sessions/:session_id/status", get(handlers::get_session_status))
        // Owner controls
        .route("/sessions/:session_id/source", post(handlers::set_source))
        .route("/sessions/:session_id/toggle", post(handlers::toggle_play_pause))
        .route("/sessions/:session_id/seek", post(handlers::seek_relative))
        // Page lifecycle signals
        .route("/sessions/:session_id/visibility", post(handlers::set_visibility))
        .route("/sessions/:session_id/pip", post(handlers::set_picture_in_picture))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        // The UI is served from another origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}
