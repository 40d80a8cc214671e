use super::{StateStore, FEED_BUFFER};
use crate::room::{generate_room_code, PlaybackState, PlaybackStateRecord, Room};
use anyhow::{anyhow, bail, Context, Result};
use async_nats::jetstream::{self, kv};
use futures::stream::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

/// Store backed by two NATS JetStream key-value buckets.
///
/// Rooms are kept under `code.<code>` and `id.<room_id>`; playback state under the
/// room id. Keeping one revision per key gives the single-row overwrite semantics,
/// and a key watch is the change feed.
pub struct NatsStore {
    rooms: kv::Store,
    states: kv::Store,
}

impl NatsStore {
    /// Connect to NATS and open (or create) both buckets
    pub async fn connect(url: &str, rooms_bucket: &str, state_bucket: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        let js = jetstream::new(client);
        let rooms = Self::open_bucket(&js, rooms_bucket).await?;
        let states = Self::open_bucket(&js, state_bucket).await?;

        Ok(Self { rooms, states })
    }

    async fn open_bucket(js: &jetstream::Context, bucket: &str) -> Result<kv::Store> {
        if let Ok(store) = js.get_key_value(bucket).await {
            return Ok(store);
        }

        info!("Creating key-value bucket {}", bucket);

        js.create_key_value(kv::Config {
            bucket: bucket.to_string(),
            history: 1,
            ..Default::default()
        })
        .await
        .with_context(|| format!("Failed to create key-value bucket {}", bucket))
    }

    async fn get_room(&self, key: &str) -> Result<Option<Room>> {
        let value = self
            .rooms
            .get(key)
            .await
            .with_context(|| format!("Failed to read room {}", key))?;

        match value {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_json<T: serde::Serialize>(store: &kv::Store, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        store
            .put(key, payload.into())
            .await
            .with_context(|| format!("Failed to write key {}", key))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StateStore for NatsStore {
    async fn create_room(&self, owner_id: &str) -> Result<Room> {
        let mut code = generate_room_code();
        while self.get_room(&format!("code.{}", code)).await?.is_some() {
            code = generate_room_code();
        }

        let room = Room::new(code, owner_id.to_string());
        Self::put_json(&self.rooms, &format!("id.{}", room.id), &room).await?;
        Self::put_json(&self.rooms, &format!("code.{}", room.code), &room).await?;

        let record = PlaybackState::empty().to_record(&room.id);
        Self::put_json(&self.states, &room.id, &record).await?;

        info!("Created room {} (id={}, owner={})", room.code, room.id, room.owner_id);

        Ok(room)
    }

    async fn find_room(&self, code: &str) -> Result<Option<Room>> {
        self.get_room(&format!("code.{}", code)).await
    }

    async fn fetch_state(&self, room_id: &str) -> Result<Option<PlaybackStateRecord>> {
        let value = self
            .states
            .get(room_id)
            .await
            .with_context(|| format!("Failed to read playback state of room {}", room_id))?;

        match value {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write_state(&self, writer_id: &str, record: PlaybackStateRecord) -> Result<()> {
        let room = match self.get_room(&format!("id.{}", record.room_id)).await? {
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

        Self::put_json(&self.states, &record.room_id, &record).await
    }

    async fn watch_state(&self, room_id: &str) -> Result<mpsc::Receiver<PlaybackStateRecord>> {
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let (started_tx, started_rx) = oneshot::channel();
        let states = self.states.clone();
        let room_id = room_id.to_string();

        tokio::spawn(async move {
            // The watch borrows its store, so both live in this task
            let mut watch = match states.watch(&room_id).await {
                Ok(watch) => {
                    let _ = started_tx.send(Ok(()));
                    watch
                }
                Err(e) => {
                    let _ = started_tx.send(Err(anyhow!(e)));
                    return;
                }
            };

            info!("Watching playback state of room {}", room_id);

            while let Some(entry) = watch.next().await {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        error!("Playback watch for room {} failed: {}", room_id, e);
                        break;
                    }
                };

                if !matches!(entry.operation, kv::Operation::Put) {
                    continue;
                }

                match serde_json::from_slice::<PlaybackStateRecord>(&entry.value) {
                    Ok(record) => {
                        if tx.send(record).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse playback state for room {}: {}", room_id, e);
                    }
                }
            }

            info!("Playback watch for room {} stopped", room_id);
        });

        started_rx
            .await
            .context("Playback watch task exited before starting")?
            .context("Failed to watch playback state")?;

        Ok(rx)
    }

    fn name(&self) -> &str {
        "nats"
    }
}
