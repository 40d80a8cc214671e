use super::state::AppState;
use crate::room::{is_valid_room_code, Role};
use crate::session::{RoomSession, SessionConfig, SessionStatus};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    /// 5-digit room code
    pub room_code: String,

    /// Local user identity
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct JoinRoomResponse {
    pub session_id: String,
    pub room_id: String,
    pub role: Role,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct LeaveRoomResponse {
    pub session_id: String,
    pub status: String,
    pub final_status: SessionStatus,
}

#[derive(Debug, Deserialize)]
pub struct SetSourceRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    /// Relative offset in seconds (negative rewinds)
    pub delta_secs: f64,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

#[derive(Debug, Deserialize)]
pub struct PictureInPictureRequest {
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

async fn find_session(state: &AppState, session_id: &str) -> Result<Arc<RoomSession>, Response> {
    let sessions = state.sessions.read().await;
    sessions.get(session_id).cloned().ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        )
    })
}

fn require_owner(session: &RoomSession) -> Result<(), Response> {
    if session.role().is_owner() {
        Ok(())
    } else {
        Err(error_response(
            StatusCode::FORBIDDEN,
            format!("Only the owner of room {} can control playback", session.room().code),
        ))
    }
}

fn accepted(session_id: String, result: anyhow::Result<()>) -> Response {
    match result {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(AcceptedResponse {
                session_id,
                status: "accepted".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Command for session {} rejected: {:#}", session_id, e);
            error_response(StatusCode::CONFLICT, format!("{:#}", e))
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions
/// Join a room as owner or viewer
pub async fn join_room(
    State(state): State<AppState>,
    Json(req): Json<JoinRoomRequest>,
) -> impl IntoResponse {
    if !is_valid_room_code(&req.room_code) {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid room code {}; expected 5 digits", req.room_code),
        );
    }

    if req.user_id.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "user_id is required".to_string());
    }

    let room = match state.store.find_room(&req.room_code).await {
        Ok(Some(room)) => room,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                format!("Room {} not found", req.room_code),
            )
        }
        Err(e) => {
            error!("Failed to look up room {}: {:#}", req.room_code, e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to look up room: {:#}", e),
            );
        }
    };

    let config = SessionConfig {
        room_code: req.room_code.clone(),
        user_id: req.user_id.clone(),
        sync: state.sync.clone(),
    };

    let session = match RoomSession::start(room, config, state.store.clone(), state.env.clone()).await
    {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to join room {}: {:#}", req.room_code, e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to join room: {:#}", e),
            );
        }
    };

    let session_id = uuid::Uuid::new_v4().to_string();
    let response = JoinRoomResponse {
        session_id: session_id.clone(),
        room_id: session.room().id.clone(),
        role: session.role(),
        status: "joined".to_string(),
    };

    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(session_id.clone(), session);
    }

    info!(
        "Session {} joined room {} as {:?}",
        session_id, req.room_code, response.role
    );

    (StatusCode::OK, Json(response)).into_response()
}

/// POST /sessions/:session_id/leave
/// Leave a room and release its player
pub async fn leave_room(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    info!("Leaving session {}", session_id);

    let session = {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&session_id)
    };

    let Some(session) = session else {
        error!("Session {} not found", session_id);
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        );
    };

    match session.leave().await {
        Ok(final_status) => (
            StatusCode::OK,
            Json(LeaveRoomResponse {
                session_id,
                status: "left".to_string(),
                final_status,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to leave session {}: {:#}", session_id, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to leave: {:#}", e),
            )
        }
    }
}

/// GET /sessions/:session_id/status
/// Current sync status of a session
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match find_session(&state, &session_id).await {
        Ok(session) => (StatusCode::OK, Json(session.status().await)).into_response(),
        Err(response) => response,
    }
}

/// POST /sessions/:session_id/source
/// Owner: load a new source URL
pub async fn set_source(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<SetSourceRequest>,
) -> impl IntoResponse {
    let session = match find_session(&state, &session_id).await {
        Ok(s) => s,
        Err(response) => return response,
    };
    if let Err(response) = require_owner(&session) {
        return response;
    }
    if req.url.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "url is required".to_string());
    }

    accepted(session_id, session.set_source(req.url.trim()).await)
}

/// POST /sessions/:session_id/toggle
/// Owner: play/pause
pub async fn toggle_play_pause(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let session = match find_session(&state, &session_id).await {
        Ok(s) => s,
        Err(response) => return response,
    };
    if let Err(response) = require_owner(&session) {
        return response;
    }

    accepted(session_id, session.toggle_play_pause().await)
}

/// POST /sessions/:session_id/seek
/// Owner: seek relative to the current position
pub async fn seek_relative(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<SeekRequest>,
) -> impl IntoResponse {
    let session = match find_session(&state, &session_id).await {
        Ok(s) => s,
        Err(response) => return response,
    };
    if let Err(response) = require_owner(&session) {
        return response;
    }

    accepted(session_id, session.seek_relative(req.delta_secs).await)
}

/// POST /sessions/:session_id/visibility
/// Page became visible or hidden
pub async fn set_visibility(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<VisibilityRequest>,
) -> impl IntoResponse {
    match find_session(&state, &session_id).await {
        Ok(session) => accepted(session_id, session.set_visibility(req.visible).await),
        Err(response) => response,
    }
}

/// POST /sessions/:session_id/pip
/// Picture-in-picture entered or left
pub async fn set_picture_in_picture(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<PictureInPictureRequest>,
) -> impl IntoResponse {
    match find_session(&state, &session_id).await {
        Ok(session) => accepted(session_id, session.set_picture_in_picture(req.active).await),
        Err(response) => response,
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
