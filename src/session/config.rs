use crate::config::SyncSettings;
use serde::{Deserialize, Serialize};

/// Configuration for joining a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 5-digit room code to join
    pub room_code: String,

    /// Identity of the local user; decides owner vs viewer
    pub user_id: String,

    /// Sync protocol timing
    #[serde(default)]
    pub sync: SyncSettings,
}

impl SessionConfig {
    pub fn new(room_code: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            room_code: room_code.into(),
            user_id: user_id.into(),
            sync: SyncSettings::default(),
        }
    }
}
