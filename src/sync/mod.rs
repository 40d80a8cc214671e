//! Playback synchronization roles
//!
//! Each client runs exactly one of these:
//! - `OwnerController`: turns local player actions into authoritative updates
//! - `ViewerSynchronizer`: reconciles the local player against those updates

mod owner;
mod viewer;

pub use owner::{OwnerController, OwnerPhase};
pub use viewer::{SyncOutcome, SyncPhase, ViewerSynchronizer};
