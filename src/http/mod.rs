//! HTTP API for the local player UI
//!
//! This module provides a REST API for driving room sessions:
//! - POST /sessions - Join a room (owner or viewer by user id)
//! - POST /sessions/:id/leave - Leave a room
//! - GET /sessions/:id/status - Query session status
//! - POST /sessions/:id/source - Owner: load a source URL
//! - POST /sessions/:id/toggle - Owner: play/pause
//! - POST /sessions/:id/seek - Owner: relative seek
//! - POST /sessions/:id/visibility - Tab/app foreground and background
//! - POST /sessions/:id/pip - Picture-in-picture enter and exit
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
