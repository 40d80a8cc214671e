//! Room identity and authoritative playback state
//!
//! The room record is read-only to the sync core: `owner_id` decides who may write
//! the single playback-state row, everyone else follows it.

mod code;
mod model;

pub use code::{generate_room_code, is_valid_room_code};
pub use model::{PlaybackState, PlaybackStateRecord, Role, Room};
