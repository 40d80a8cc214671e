//! Room session management
//!
//! This module provides the `RoomSession` abstraction that manages:
//! - Room lookup and role resolution (owner or viewer)
//! - A single driver task owning the owner controller or the viewer synchronizer
//! - The playback change feed, player events and the owner's position sampler
//! - Session status snapshots and teardown

mod config;
mod session;
mod stats;

pub use config::SessionConfig;
pub use session::{RoomSession, SessionCommand};
pub use stats::{SessionPhase, SessionStatus};
