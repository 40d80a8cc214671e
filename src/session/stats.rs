use crate::player::MediaKind;
use crate::room::Role;
use crate::sync::{OwnerPhase, SyncPhase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State machine phase of the session's controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionPhase {
    Owner(OwnerPhase),
    Viewer(SyncPhase),
}

impl SessionPhase {
    /// Phase of a controller that has not started yet
    pub fn initial(role: Role) -> Self {
        match role {
            Role::Owner => SessionPhase::Owner(OwnerPhase::Idle),
            Role::Viewer => SessionPhase::Viewer(SyncPhase::Unsynced),
        }
    }
}

/// Snapshot of a room session, refreshed by the driver after every event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub room_id: String,
    pub room_code: String,
    pub user_id: String,
    pub role: Role,

    /// Whether the driver task is still running
    pub active: bool,

    pub joined_at: DateTime<Utc>,

    pub phase: SessionPhase,

    pub source_url: Option<String>,
    pub media_kind: Option<MediaKind>,

    /// Whether the player accepts controls
    pub ready: bool,

    /// Authoritative play state as last published (owner) or applied (viewer)
    pub is_playing: bool,

    /// Authoritative position at `last_updated_at`
    pub position_secs: f64,

    pub last_updated_at: Option<DateTime<Utc>>,

    /// Local backend playhead; for the owner, the last time the player reported
    pub local_position_secs: Option<f64>,

    pub updates_applied: usize,
    pub updates_ignored: usize,
    pub seeks: usize,
    pub publish_failures: usize,

    /// Most recent load or command failure
    pub last_error: Option<String>,
}
