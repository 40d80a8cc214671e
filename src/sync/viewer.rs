use crate::clock::{compute_target_position, drift_exceeds, SyncMode};
use crate::config::SyncSettings;
use crate::player::{PlayerBackend, PlayerEvent, PlayerSession};
use crate::room::PlaybackState;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Viewer-side state machine: `Unsynced → Syncing → Synced`, re-entering
/// `Syncing` on every trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Unsynced,
    Syncing,
    Synced,
}

/// Result of one reconciliation trigger
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncOutcome {
    /// Update carried an already-applied `updated_at`
    Duplicate,
    /// Nothing to reconcile against yet (no source, or player still loading)
    Deferred,
    Applied {
        target: f64,
        seeked: bool,
        play_state_changed: bool,
    },
}

/// The subordinate role: follows the owner's published state
pub struct ViewerSynchronizer {
    player: PlayerSession,
    settings: SyncSettings,
    latest: Option<PlaybackState>,
    phase: SyncPhase,
    visible: bool,
    in_pip: bool,
    /// Playback was running when picture-in-picture started
    resume_after_pip: bool,
    updates_applied: usize,
    updates_ignored: usize,
    seeks: usize,
}

impl ViewerSynchronizer {
    pub fn new(player: PlayerSession, settings: SyncSettings) -> Self {
        Self {
            player,
            settings,
            latest: None,
            phase: SyncPhase::Unsynced,
            visible: true,
            in_pip: false,
            resume_after_pip: false,
            updates_applied: 0,
            updates_ignored: 0,
            seeks: 0,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn latest(&self) -> Option<&PlaybackState> {
        self.latest.as_ref()
    }

    pub fn player(&self) -> &PlayerSession {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut PlayerSession {
        &mut self.player
    }

    pub fn updates_applied(&self) -> usize {
        self.updates_applied
    }

    pub fn updates_ignored(&self) -> usize {
        self.updates_ignored
    }

    pub fn seeks(&self) -> usize {
        self.seeks
    }

    /// Initial mount: adopt the room's current state
    pub async fn start(&mut self, initial: PlaybackState, now: DateTime<Utc>) -> Result<SyncOutcome> {
        self.apply_update(initial, now).await
    }

    /// Apply an authoritative update, ignoring re-deliveries of the same snapshot
    pub async fn apply_update(&mut self, state: PlaybackState, now: DateTime<Utc>) -> Result<SyncOutcome> {
        if self.player.last_applied_updated_at == Some(state.last_updated_at) {
            self.updates_ignored += 1;
            debug!("Ignoring duplicate update at {}", state.last_updated_at);
            return Ok(SyncOutcome::Duplicate);
        }

        self.player.last_applied_updated_at = Some(state.last_updated_at);
        self.updates_applied += 1;

        let source_changed = state.source_url.as_deref() != self.player.source_url();
        // A failed source is only retried when the owner resubmits it (reset state)
        let retry = !source_changed
            && state.source_url.is_some()
            && self.player.adapter().is_none()
            && !state.is_playing
            && state.position_seconds == 0.0;
        let source = state.source_url.clone();
        self.latest = Some(state);

        if source_changed || retry {
            self.phase = SyncPhase::Syncing;
            // Reconciled on the adapter's ready event
            let loaded = if retry {
                self.player.reload().await
            } else {
                self.player.set_source(source.as_deref()).await
            };
            if let Err(e) = loaded {
                self.phase = SyncPhase::Unsynced;
                return Err(e);
            }
            if source.is_none() {
                self.phase = SyncPhase::Synced;
            }
            return Ok(SyncOutcome::Deferred);
        }

        self.reconcile(self.initial_mode(), now).await
    }

    pub async fn handle_player_event(
        &mut self,
        event: PlayerEvent,
        now: DateTime<Utc>,
    ) -> Result<Option<SyncOutcome>> {
        self.player.handle_event(&event).await;

        match event {
            PlayerEvent::Ready { .. } => {
                let outcome = self.reconcile(self.initial_mode(), now).await?;
                Ok(Some(outcome))
            }
            PlayerEvent::Error(_) => {
                self.phase = SyncPhase::Unsynced;
                Ok(None)
            }
            PlayerEvent::TimeUpdate(_) => Ok(None),
        }
    }

    /// Tab/app visibility change; resynchronizes when coming back to the foreground
    pub async fn set_visibility(&mut self, visible: bool, now: DateTime<Utc>) -> Result<Option<SyncOutcome>> {
        let was_hidden = !self.visible;
        self.visible = visible;

        if !visible || !was_hidden {
            return Ok(None);
        }

        info!("Returned to foreground, resynchronizing");
        let outcome = self.reconcile(SyncMode::BackgroundResume, now).await?;
        Ok(Some(outcome))
    }

    /// Picture-in-picture enter/exit
    pub async fn set_picture_in_picture(
        &mut self,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<SyncOutcome>> {
        if active {
            if !self.in_pip {
                self.in_pip = true;
                self.resume_after_pip = match self.player.adapter() {
                    Some(adapter) if adapter.is_ready() => !adapter.is_paused().await,
                    _ => false,
                };
                debug!("Entered picture-in-picture (playing={})", self.resume_after_pip);
            }
            return Ok(None);
        }

        if !self.in_pip {
            return Ok(None);
        }
        self.in_pip = false;

        info!("Left picture-in-picture, resynchronizing");
        let outcome = self.reconcile(SyncMode::BackgroundResume, now).await?;

        let should_play = self.latest.as_ref().is_some_and(|s| s.is_playing);
        if std::mem::take(&mut self.resume_after_pip) && should_play {
            self.force_resume().await;
        }

        Ok(Some(outcome))
    }

    /// Keep calling play until the backend reports playing, backing off between tries
    async fn force_resume(&mut self) -> bool {
        let attempts = self.settings.pip_resume_attempts;
        let mut delay = self.settings.pip_resume_backoff();

        for attempt in 1..=attempts {
            let Some(adapter) = self.player.ready_adapter_mut() else {
                return false;
            };

            if !adapter.is_paused().await {
                return true;
            }

            if let Err(e) = adapter.play().await {
                debug!("Resume attempt {} failed: {:#}", attempt, e);
            }

            tokio::time::sleep(delay).await;
            delay *= 2;
        }

        let resumed = match self.player.adapter() {
            Some(adapter) => !adapter.is_paused().await,
            None => false,
        };
        if !resumed {
            warn!("Playback still paused after {} resume attempts", attempts);
        }
        resumed
    }

    /// Move the local player onto the authoritative timeline
    ///
    /// Seeks only when drift exceeds the threshold; play/pause always follows the
    /// owner exactly.
    async fn reconcile(&mut self, mode: SyncMode, now: DateTime<Utc>) -> Result<SyncOutcome> {
        let Some(state) = self.latest.clone() else {
            return Ok(SyncOutcome::Deferred);
        };
        if state.source_url.is_none() {
            return Ok(SyncOutcome::Deferred);
        }

        if self.player.adapter().is_none() {
            // Failed source: stays unsynced until a new source arrives
            return Ok(SyncOutcome::Deferred);
        }

        self.phase = SyncPhase::Syncing;

        let threshold = self.settings.drift_threshold_secs;
        let Some(adapter) = self.player.ready_adapter_mut() else {
            return Ok(SyncOutcome::Deferred);
        };

        let target = compute_target_position(&state, now, mode);
        let local = adapter.current_time().await;

        let seeked = drift_exceeds(local, target, threshold);
        if seeked {
            adapter.seek(target).await?;
        }

        let paused = adapter.is_paused().await;
        let play_state_changed = if state.is_playing && paused {
            if let Err(e) = adapter.play().await {
                warn!("Failed to start playback: {:#}", e);
            }
            true
        } else if !state.is_playing && !paused {
            adapter.pause().await?;
            true
        } else {
            false
        };

        if seeked {
            self.seeks += 1;
            info!("Resynced: local {:.1}s -> target {:.1}s", local, target);
        }
        self.phase = SyncPhase::Synced;

        Ok(SyncOutcome::Applied {
            target,
            seeked,
            play_state_changed,
        })
    }

    fn initial_mode(&self) -> SyncMode {
        SyncMode::InitialSync {
            grace_window_secs: self.settings.initial_sync_grace_secs,
        }
    }

    pub async fn teardown(&mut self) {
        self.player.teardown().await;
        self.phase = SyncPhase::Unsynced;
    }
}
