use crate::clock::{compute_target_position, SyncMode};
use crate::player::{PlayerBackend, PlayerEvent, PlayerSession};
use crate::room::{PlaybackState, Role, Room};
use crate::store::StateStore;
use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Owner-side state machine: `Idle → Loaded → {Playing, Paused}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerPhase {
    Idle,
    Loaded,
    Playing,
    Paused,
}

/// The authoritative role: every explicit action and sampler tick becomes a
/// last-writer-wins overwrite of the room's playback state.
pub struct OwnerController {
    room: Room,
    user_id: String,
    store: Arc<dyn StateStore>,
    player: PlayerSession,
    state: PlaybackState,
    phase: OwnerPhase,
    /// Latest playhead reported by the backend's time updates, or set by a local
    /// control
    observed_position: Option<f64>,
    publish_failures: usize,
}

impl OwnerController {
    /// Refuses anyone but the room owner
    pub fn new(
        room: Room,
        user_id: &str,
        store: Arc<dyn StateStore>,
        player: PlayerSession,
        state: PlaybackState,
    ) -> Result<Self> {
        if Role::for_user(&room, user_id) != Role::Owner || !player.role().is_owner() {
            bail!("User {} does not own room {}", user_id, room.code);
        }

        let phase = if state.source_url.is_some() {
            OwnerPhase::Loaded
        } else {
            OwnerPhase::Idle
        };

        Ok(Self {
            room,
            user_id: user_id.to_string(),
            store,
            player,
            state,
            phase,
            observed_position: None,
            publish_failures: 0,
        })
    }

    pub fn phase(&self) -> OwnerPhase {
        self.phase
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn player(&self) -> &PlayerSession {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut PlayerSession {
        &mut self.player
    }

    pub fn observed_position(&self) -> Option<f64> {
        self.observed_position
    }

    pub fn publish_failures(&self) -> usize {
        self.publish_failures
    }

    /// Reload the room's current source after the owner (re)joins
    pub async fn start(&mut self) -> Result<()> {
        let Some(url) = self.state.source_url.clone() else {
            return Ok(());
        };

        info!("Owner rejoining room {} with source {}", self.room.code, url);
        self.player.set_source(Some(&url)).await?;
        Ok(())
    }

    /// Load a new source: position 0, paused
    pub async fn set_source(&mut self, url: &str, now: DateTime<Utc>) -> Result<()> {
        let url = url.trim();
        if url.is_empty() {
            bail!("Source URL is empty");
        }

        self.state = PlaybackState {
            source_url: Some(url.to_string()),
            is_playing: false,
            position_seconds: 0.0,
            last_updated_at: now,
        };
        self.phase = OwnerPhase::Loaded;
        self.observed_position = None;

        info!("Owner set source for room {}: {}", self.room.code, url);
        self.publish().await;

        let retry = self.player.source_url() == Some(url) && self.player.adapter().is_none();
        let rebuilt = if retry {
            // Resubmitting a source that failed to load
            self.player.reload().await?
        } else {
            self.player.set_source(Some(url)).await?
        };
        if !rebuilt {
            // Same source resubmitted: rewind in place
            if let Some(adapter) = self.player.ready_adapter_mut() {
                adapter.pause().await?;
                adapter.seek(0.0).await?;
            }
        }

        Ok(())
    }

    /// Flip play/pause and publish the new state with the current position
    pub async fn toggle_play_pause(&mut self, now: DateTime<Utc>) -> Result<bool> {
        let adapter = self
            .player
            .ready_adapter_mut()
            .ok_or_else(|| anyhow!("No media loaded"))?;

        let should_play = adapter.is_paused().await;
        if should_play {
            if let Err(e) = adapter.play().await {
                warn!("Local play failed: {:#}", e);
            }
        } else {
            adapter.pause().await?;
        }
        let position = adapter.current_time().await;

        self.state.is_playing = should_play;
        self.state.position_seconds = position;
        self.observed_position = Some(position);
        self.state.last_updated_at = now;
        self.phase = if should_play {
            OwnerPhase::Playing
        } else {
            OwnerPhase::Paused
        };

        info!(
            "Owner {} at {:.1}s",
            if should_play { "played" } else { "paused" },
            position
        );
        self.publish().await;

        Ok(should_play)
    }

    /// Seek relative to the current position, never before 0
    pub async fn seek_relative(&mut self, delta_secs: f64, now: DateTime<Utc>) -> Result<f64> {
        let adapter = self
            .player
            .ready_adapter_mut()
            .ok_or_else(|| anyhow!("No media loaded"))?;

        let current = adapter.current_time().await;
        let target = (current + delta_secs).max(0.0);
        adapter.seek(target).await?;

        self.state.position_seconds = target;
        self.state.last_updated_at = now;
        self.observed_position = Some(target);

        info!("Owner seeked {:+.1}s to {:.1}s", delta_secs, target);
        self.publish().await;

        Ok(target)
    }

    /// Periodic position sample; publishes only while actually playing
    pub async fn sample(&mut self, now: DateTime<Utc>) -> bool {
        if self.phase != OwnerPhase::Playing || !self.state.is_playing {
            return false;
        }

        let Some(adapter) = self.player.ready_adapter_mut() else {
            return false;
        };

        if adapter.is_paused().await {
            return false;
        }

        let position = adapter.current_time().await;
        self.state.position_seconds = position;
        self.state.last_updated_at = now;

        debug!("Owner sample at {:.1}s", position);
        self.publish().await;

        true
    }

    pub async fn handle_player_event(&mut self, event: PlayerEvent, now: DateTime<Utc>) {
        self.player.handle_event(&event).await;

        match event {
            PlayerEvent::Ready { duration } => {
                debug!("Owner player ready (duration={:?})", duration);
                if let Err(e) = self.restore_position(now).await {
                    warn!("Failed to restore owner position: {:#}", e);
                }
            }
            PlayerEvent::TimeUpdate(t) => {
                self.observed_position = Some(t);
            }
            PlayerEvent::Error(_) => {
                self.phase = OwnerPhase::Idle;
                self.observed_position = None;
            }
        }
    }

    /// Place a freshly loaded player where the room currently is
    async fn restore_position(&mut self, now: DateTime<Utc>) -> Result<()> {
        let target = compute_target_position(&self.state, now, SyncMode::initial());
        let is_playing = self.state.is_playing;

        let Some(adapter) = self.player.ready_adapter_mut() else {
            return Ok(());
        };

        adapter.seek(target).await?;
        if is_playing {
            adapter.play().await?;
            self.phase = OwnerPhase::Playing;
        } else if self.phase != OwnerPhase::Loaded {
            self.phase = OwnerPhase::Paused;
        }

        Ok(())
    }

    /// Write the current state; failures are logged, never rolled back
    async fn publish(&mut self) {
        let record = self.state.to_record(&self.room.id);
        if let Err(e) = self.store.write_state(&self.user_id, record).await {
            self.publish_failures += 1;
            error!("Failed to publish playback state for room {}: {:#}", self.room.code, e);
        }
    }

    pub async fn teardown(&mut self) {
        self.player.teardown().await;
    }
}
