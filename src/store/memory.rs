use super::{StateStore, FEED_BUFFER};
use crate::room::{generate_room_code, PlaybackState, PlaybackStateRecord, Room};
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};

/// In-process store used by the agent when no NATS server is configured, and by tests
pub struct MemoryStore {
    /// Rooms by join code
    rooms: RwLock<HashMap<String, Room>>,

    /// Playback state by room id
    states: RwLock<HashMap<String, PlaybackStateRecord>>,

    /// Change feed per room id
    feeds: RwLock<HashMap<String, broadcast::Sender<PlaybackStateRecord>>>,

    /// Simulates the persistence layer rejecting writes
    reject_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
            feeds: RwLock::new(HashMap::new()),
            reject_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `write_state` fail (or succeed again)
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    async fn room_by_id(&self, room_id: &str) -> Option<Room> {
        let rooms = self.rooms.read().await;
        rooms.values().find(|r| r.id == room_id).cloned()
    }

    async fn feed(&self, room_id: &str) -> broadcast::Sender<PlaybackStateRecord> {
        {
            let feeds = self.feeds.read().await;
            if let Some(tx) = feeds.get(room_id) {
                return tx.clone();
            }
        }

        let mut feeds = self.feeds.write().await;
        feeds
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(FEED_BUFFER).0)
            .clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StateStore for MemoryStore {
    async fn create_room(&self, owner_id: &str) -> Result<Room> {
        let mut rooms = self.rooms.write().await;

        let mut code = generate_room_code();
        while rooms.contains_key(&code) {
            code = generate_room_code();
        }

        let room = Room::new(code.clone(), owner_id.to_string());
        rooms.insert(code, room.clone());
        drop(rooms);

        let record = PlaybackState::empty().to_record(&room.id);
        self.states.write().await.insert(room.id.clone(), record);

        info!("Created room {} (id={}, owner={})", room.code, room.id, room.owner_id);

        Ok(room)
    }

    async fn find_room(&self, code: &str) -> Result<Option<Room>> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(code).cloned())
    }

    async fn fetch_state(&self, room_id: &str) -> Result<Option<PlaybackStateRecord>> {
        let states = self.states.read().await;
        Ok(states.get(room_id).cloned())
    }

    async fn write_state(&self, writer_id: &str, record: PlaybackStateRecord) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            bail!("Playback state write rejected for room {}", record.room_id);
        }

        let room = match self.room_by_id(&record.room_id).await {
            Some(room) => room,
            None => bail!("Room {} not found", record.room_id),
        };

        if room.owner_id != writer_id {
            bail!(
                "User {} is not the owner of room {}; only the owner may write playback state",
                writer_id,
                room.code
            );
        }

        self.states
            .write()
            .await
            .insert(record.room_id.clone(), record.clone());

        let feed = self.feed(&record.room_id).await;
        // No receivers is fine: nobody is watching yet
        let delivered = feed.send(record).unwrap_or(0);
        debug!("Playback state committed for room {} ({} watchers)", room.code, delivered);

        Ok(())
    }

    async fn watch_state(&self, room_id: &str) -> Result<mpsc::Receiver<PlaybackStateRecord>> {
        let mut feed_rx = self.feed(room_id).await.subscribe();
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let room_id = room_id.to_string();

        tokio::spawn(async move {
            loop {
                match feed_rx.recv().await {
                    Ok(record) => {
                        if tx.send(record).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Watcher for room {} lagged, skipped {} updates", room_id, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Playback feed for room {} closed", room_id);
        });

        Ok(rx)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
