//! Persistence and change-feed seam
//!
//! Playback state is a single row per room with last-writer-wins overwrite
//! semantics. Every write is fanned out to all watchers of that room in commit
//! order; nothing here orders or acknowledges updates beyond that.

mod memory;
mod nats;

pub use memory::MemoryStore;
pub use nats::NatsStore;

use crate::room::{PlaybackStateRecord, Room};
use anyhow::Result;
use tokio::sync::mpsc;

/// Buffered updates per watcher before the feed applies backpressure
pub const FEED_BUFFER: usize = 64;

/// Room directory plus playback-state table with a change feed
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    /// Create a room owned by `owner_id` together with its empty playback state
    async fn create_room(&self, owner_id: &str) -> Result<Room>;

    /// Look up a room by its join code
    async fn find_room(&self, code: &str) -> Result<Option<Room>>;

    /// Current playback state of a room, if any was ever written
    async fn fetch_state(&self, room_id: &str) -> Result<Option<PlaybackStateRecord>>;

    /// Overwrite a room's playback state. Fails unless `writer_id` owns the room.
    async fn write_state(&self, writer_id: &str, record: PlaybackStateRecord) -> Result<()>;

    /// Subscribe to playback-state updates for one room
    async fn watch_state(&self, room_id: &str) -> Result<mpsc::Receiver<PlaybackStateRecord>>;

    /// Store name for logging
    fn name(&self) -> &str;
}
