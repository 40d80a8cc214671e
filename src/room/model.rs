use crate::clock::{compute_target_position, SyncMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Room record, as stored by the external room directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    /// 5-digit join code
    pub code: String,
    /// The single client allowed to mutate playback state
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(code: String, owner_id: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code,
            owner_id,
            created_at: Utc::now(),
        }
    }
}

/// Role of a connected client within a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Viewer,
}

impl Role {
    /// Owner if and only if `user_id` is the room's owner
    pub fn for_user(room: &Room, user_id: &str) -> Self {
        if room.owner_id == user_id {
            Role::Owner
        } else {
            Role::Viewer
        }
    }

    pub fn is_owner(self) -> bool {
        self == Role::Owner
    }
}

/// Authoritative playback snapshot for a room
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    /// Current media source; `None` means nothing is loaded
    pub source_url: Option<String>,

    /// Owner's last intended play/pause state
    pub is_playing: bool,

    /// Owner's playback position at `last_updated_at`
    pub position_seconds: f64,

    /// When the snapshot was taken (explicit action or sampler tick)
    pub last_updated_at: DateTime<Utc>,
}

impl PlaybackState {
    /// State of a freshly created room
    pub fn empty() -> Self {
        Self {
            source_url: None,
            is_playing: false,
            position_seconds: 0.0,
            last_updated_at: Utc::now(),
        }
    }

    pub fn from_record(record: &PlaybackStateRecord) -> Self {
        Self {
            source_url: record.video_url.clone(),
            is_playing: record.is_playing,
            position_seconds: record.playback_time.max(0.0),
            last_updated_at: record.updated_at,
        }
    }

    pub fn to_record(&self, room_id: &str) -> PlaybackStateRecord {
        PlaybackStateRecord {
            room_id: room_id.to_string(),
            video_url: self.source_url.clone(),
            is_playing: self.is_playing,
            playback_time: self.position_seconds,
            updated_at: self.last_updated_at,
        }
    }

    /// Where the owner's playhead is now, assuming uninterrupted playback
    pub fn extrapolated_position(&self, now: DateTime<Utc>) -> f64 {
        compute_target_position(self, now, SyncMode::BackgroundResume)
    }
}

/// Playback state row exchanged with the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStateRecord {
    pub room_id: String,
    pub video_url: Option<String>,
    pub is_playing: bool,
    pub playback_time: f64,
    /// ISO-8601 timestamp
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_owner_id() {
        let room = Room::new("48213".to_string(), "alice".to_string());
        assert_eq!(Role::for_user(&room, "alice"), Role::Owner);
        assert_eq!(Role::for_user(&room, "bob"), Role::Viewer);
        assert!(!Role::for_user(&room, "").is_owner());
    }

    #[test]
    fn test_record_wire_format() {
        let json = r#"{
            "room_id": "room-1",
            "video_url": null,
            "is_playing": false,
            "playback_time": 0,
            "updated_at": "2025-10-27T14:30:00Z"
        }"#;

        let record: PlaybackStateRecord = serde_json::from_str(json).unwrap();
        let state = PlaybackState::from_record(&record);
        assert_eq!(state.source_url, None);
        assert!(!state.is_playing);
        assert_eq!(state.position_seconds, 0.0);
        assert_eq!(state.last_updated_at.to_rfc3339(), "2025-10-27T14:30:00+00:00");

        let out = serde_json::to_string(&state.to_record("room-1")).unwrap();
        assert!(out.contains("\"video_url\":null"));
        assert!(out.contains("\"playback_time\":0.0"));
        assert!(out.contains("\"updated_at\":\"2025-10-27T14:30:00Z\""));
    }

    #[test]
    fn test_negative_playback_time_is_clamped() {
        let record = PlaybackStateRecord {
            room_id: "room-1".to_string(),
            video_url: Some("https://youtu.be/dQw4w9WgXcQ".to_string()),
            is_playing: true,
            playback_time: -2.5,
            updated_at: Utc::now(),
        };
        assert_eq!(PlaybackState::from_record(&record).position_seconds, 0.0);
    }
}
