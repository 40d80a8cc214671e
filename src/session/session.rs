use super::config::SessionConfig;
use super::stats::{SessionPhase, SessionStatus};
use crate::player::{PlayerBackend, PlayerEnv, PlayerEvent, PlayerSession};
use crate::room::{is_valid_room_code, PlaybackState, PlaybackStateRecord, Role, Room};
use crate::store::StateStore;
use crate::sync::{OwnerController, ViewerSynchronizer};
use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Input to a session's driver task
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SetSource(String),
    TogglePlayPause,
    SeekRelative(f64),
    Visibility(bool),
    PictureInPicture(bool),
    Leave,
}

/// The one controller a client runs
enum Controller {
    Owner(OwnerController),
    Viewer(ViewerSynchronizer),
}

impl Controller {
    fn player_mut(&mut self) -> &mut PlayerSession {
        match self {
            Controller::Owner(owner) => owner.player_mut(),
            Controller::Viewer(viewer) => viewer.player_mut(),
        }
    }

    fn is_owner(&self) -> bool {
        matches!(self, Controller::Owner(_))
    }

    async fn start(&mut self, initial: PlaybackState) -> Result<()> {
        match self {
            Controller::Owner(owner) => owner.start().await,
            Controller::Viewer(viewer) => viewer.start(initial, Utc::now()).await.map(|_| ()),
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) -> Result<()> {
        let now = Utc::now();
        match (self, command) {
            (Controller::Owner(owner), SessionCommand::SetSource(url)) => {
                owner.set_source(&url, now).await
            }
            (Controller::Owner(owner), SessionCommand::TogglePlayPause) => {
                owner.toggle_play_pause(now).await.map(|_| ())
            }
            (Controller::Owner(owner), SessionCommand::SeekRelative(delta)) => {
                owner.seek_relative(delta, now).await.map(|_| ())
            }
            (Controller::Viewer(viewer), SessionCommand::Visibility(visible)) => {
                viewer.set_visibility(visible, now).await.map(|_| ())
            }
            (Controller::Viewer(viewer), SessionCommand::PictureInPicture(active)) => {
                viewer.set_picture_in_picture(active, now).await.map(|_| ())
            }
            (Controller::Owner(_), SessionCommand::Visibility(_))
            | (Controller::Owner(_), SessionCommand::PictureInPicture(_)) => {
                debug!("Owner ignores visibility and picture-in-picture changes");
                Ok(())
            }
            (_, SessionCommand::Leave) => Ok(()),
            (Controller::Viewer(_), command) => {
                bail!("Viewers cannot issue {:?}", command)
            }
        }
    }

    async fn handle_update(&mut self, record: PlaybackStateRecord) -> Result<()> {
        match self {
            Controller::Owner(_) => Ok(()),
            Controller::Viewer(viewer) => {
                let state = PlaybackState::from_record(&record);
                viewer.apply_update(state, Utc::now()).await.map(|_| ())
            }
        }
    }

    async fn handle_player_event(&mut self, event: PlayerEvent) -> Result<()> {
        let now = Utc::now();
        match self {
            Controller::Owner(owner) => {
                owner.handle_player_event(event, now).await;
                Ok(())
            }
            Controller::Viewer(viewer) => viewer.handle_player_event(event, now).await.map(|_| ()),
        }
    }

    async fn sample(&mut self) {
        if let Controller::Owner(owner) = self {
            owner.sample(Utc::now()).await;
        }
    }

    async fn refresh(&self, status: &mut SessionStatus) {
        let (player, state) = match self {
            Controller::Owner(owner) => {
                status.phase = SessionPhase::Owner(owner.phase());
                status.publish_failures = owner.publish_failures();
                (owner.player(), Some(owner.state()))
            }
            Controller::Viewer(viewer) => {
                status.phase = SessionPhase::Viewer(viewer.phase());
                status.updates_applied = viewer.updates_applied();
                status.updates_ignored = viewer.updates_ignored();
                status.seeks = viewer.seeks();
                (viewer.player(), viewer.latest())
            }
        };

        if let Some(state) = state {
            status.is_playing = state.is_playing;
            status.position_secs = state.position_seconds;
            status.last_updated_at = Some(state.last_updated_at);
        }

        status.source_url = player.source_url().map(str::to_string);
        status.media_kind = player.media_kind();
        status.ready = player.is_ready();
        let reported = match self {
            Controller::Owner(owner) => owner.observed_position(),
            Controller::Viewer(_) => None,
        };
        status.local_position_secs = match player.adapter() {
            Some(adapter) if adapter.is_ready() => match reported {
                Some(t) => Some(t),
                None => Some(adapter.current_time().await),
            },
            _ => None,
        };
        if let Some(err) = player.load_error() {
            status.last_error = Some(err.to_string());
        }
    }

    async fn teardown(&mut self) {
        match self {
            Controller::Owner(owner) => owner.teardown().await,
            Controller::Viewer(viewer) => viewer.teardown().await,
        }
    }
}

/// A client's membership in one room: exactly one controller, driven by one task
pub struct RoomSession {
    room: Room,
    role: Role,
    user_id: String,

    /// Command channel into the driver task
    commands: mpsc::Sender<SessionCommand>,

    /// Latest status snapshot
    status: Arc<Mutex<SessionStatus>>,

    /// Whether the driver task is running
    is_active: Arc<AtomicBool>,

    /// Handle for the driver task
    driver_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RoomSession {
    /// Look up the room by code and join it
    pub async fn join(
        config: SessionConfig,
        store: Arc<dyn StateStore>,
        env: PlayerEnv,
    ) -> Result<Self> {
        if !is_valid_room_code(&config.room_code) {
            bail!("Invalid room code: {}", config.room_code);
        }

        let room = store
            .find_room(&config.room_code)
            .await
            .context("Failed to look up room")?
            .ok_or_else(|| anyhow!("Room {} not found", config.room_code))?;

        Self::start(room, config, store, env).await
    }

    /// Join an already resolved room
    pub async fn start(
        room: Room,
        config: SessionConfig,
        store: Arc<dyn StateStore>,
        env: PlayerEnv,
    ) -> Result<Self> {
        let role = Role::for_user(&room, &config.user_id);
        info!(
            "Joining room {} as {:?} (user={}, store={})",
            room.code,
            role,
            config.user_id,
            store.name()
        );

        // Subscribe before reading so no update between the two is lost
        let feed = match role {
            Role::Viewer => Some(
                store
                    .watch_state(&room.id)
                    .await
                    .context("Failed to subscribe to playback updates")?,
            ),
            Role::Owner => None,
        };

        let initial = store
            .fetch_state(&room.id)
            .await
            .context("Failed to fetch playback state")?
            .map(|record| PlaybackState::from_record(&record))
            .unwrap_or_else(PlaybackState::empty);

        let player = PlayerSession::new(env, role);
        let controller = match role {
            Role::Owner => Controller::Owner(OwnerController::new(
                room.clone(),
                &config.user_id,
                Arc::clone(&store),
                player,
                initial.clone(),
            )?),
            Role::Viewer => Controller::Viewer(ViewerSynchronizer::new(player, config.sync.clone())),
        };

        let status = Arc::new(Mutex::new(SessionStatus {
            room_id: room.id.clone(),
            room_code: room.code.clone(),
            user_id: config.user_id.clone(),
            role,
            active: true,
            joined_at: Utc::now(),
            phase: SessionPhase::initial(role),
            source_url: None,
            media_kind: None,
            ready: false,
            is_playing: false,
            position_secs: 0.0,
            last_updated_at: None,
            local_position_secs: None,
            updates_applied: 0,
            updates_ignored: 0,
            seeks: 0,
            publish_failures: 0,
            last_error: None,
        }));

        let (commands, command_rx) = mpsc::channel(32);
        let is_active = Arc::new(AtomicBool::new(true));

        let driver = tokio::spawn(Self::drive(
            controller,
            initial,
            command_rx,
            feed,
            Arc::clone(&status),
            Arc::clone(&is_active),
            config.sync.sample_interval(),
        ));

        Ok(Self {
            room,
            role,
            user_id: config.user_id,
            commands,
            status,
            is_active,
            driver_handle: Arc::new(Mutex::new(Some(driver))),
        })
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    /// Owner: load a new source
    pub async fn set_source(&self, url: &str) -> Result<()> {
        self.require_owner("change the source")?;
        self.send(SessionCommand::SetSource(url.to_string())).await
    }

    /// Owner: toggle play/pause
    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.require_owner("play or pause")?;
        self.send(SessionCommand::TogglePlayPause).await
    }

    /// Owner: seek by `delta_secs`
    pub async fn seek_relative(&self, delta_secs: f64) -> Result<()> {
        self.require_owner("seek")?;
        if !delta_secs.is_finite() {
            bail!("Seek offset must be finite");
        }
        self.send(SessionCommand::SeekRelative(delta_secs)).await
    }

    /// Tab/app visibility change
    pub async fn set_visibility(&self, visible: bool) -> Result<()> {
        self.send(SessionCommand::Visibility(visible)).await
    }

    /// Picture-in-picture enter/exit
    pub async fn set_picture_in_picture(&self, active: bool) -> Result<()> {
        self.send(SessionCommand::PictureInPicture(active)).await
    }

    /// Get the current session status
    pub async fn status(&self) -> SessionStatus {
        self.status.lock().await.clone()
    }

    /// Leave the room: stop the driver and release the player
    pub async fn leave(&self) -> Result<SessionStatus> {
        if !self.is_active() {
            warn!("Session for room {} already ended", self.room.code);
            return Ok(self.status().await);
        }

        info!("Leaving room {}", self.room.code);

        // A closed channel means the driver is already gone
        let _ = self.commands.send(SessionCommand::Leave).await;

        {
            let mut handle = self.driver_handle.lock().await;
            if let Some(task) = handle.take() {
                if let Err(e) = task.await {
                    error!("Session driver panicked: {}", e);
                }
            }
        }

        self.is_active.store(false, Ordering::SeqCst);
        info!("Left room {}", self.room.code);

        Ok(self.status().await)
    }

    fn require_owner(&self, action: &str) -> Result<()> {
        if !self.role.is_owner() {
            bail!("Only the room owner can {}", action);
        }
        Ok(())
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        if !self.is_active() {
            bail!("Session for room {} has ended", self.room.code);
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("Session for room {} has ended", self.room.code))
    }

    /// Single task per client: every suspension point is a branch of one select
    async fn drive(
        mut controller: Controller,
        initial: PlaybackState,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut feed: Option<mpsc::Receiver<PlaybackStateRecord>>,
        status: Arc<Mutex<SessionStatus>>,
        is_active: Arc<AtomicBool>,
        sample_interval: Duration,
    ) {
        info!("Session driver started");

        let mut last_error: Option<String> = None;

        if let Err(e) = controller.start(initial).await {
            error!("Initial sync failed: {:#}", e);
            last_error = Some(format!("{:#}", e));
        }
        Self::publish_status(&controller, &status, &mut last_error).await;

        let is_owner = controller.is_owner();
        let mut sampler = tokio::time::interval(sample_interval);
        sampler.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let result = tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Leave) | None => break,
                    Some(command) => controller.handle_command(command).await,
                },
                update = next_update(&mut feed), if feed.is_some() => match update {
                    Some(record) => controller.handle_update(record).await,
                    None => {
                        warn!("Playback feed closed; no further updates will arrive");
                        feed = None;
                        Ok(())
                    }
                },
                event = controller.player_mut().next_event() => {
                    controller.handle_player_event(event).await
                }
                _ = sampler.tick(), if is_owner => {
                    controller.sample().await;
                    Ok(())
                }
            };

            if let Err(e) = result {
                error!("Session step failed: {:#}", e);
                last_error = Some(format!("{:#}", e));
            }

            Self::publish_status(&controller, &status, &mut last_error).await;
        }

        controller.teardown().await;
        Self::publish_status(&controller, &status, &mut last_error).await;
        status.lock().await.active = false;
        is_active.store(false, Ordering::SeqCst);

        info!("Session driver stopped");
    }

    async fn publish_status(
        controller: &Controller,
        status: &Arc<Mutex<SessionStatus>>,
        last_error: &mut Option<String>,
    ) {
        let mut snapshot = status.lock().await.clone();
        controller.refresh(&mut snapshot).await;
        if let Some(err) = last_error.take() {
            snapshot.last_error = Some(err);
        }
        *status.lock().await = snapshot;
    }
}

async fn next_update(
    feed: &mut Option<mpsc::Receiver<PlaybackStateRecord>>,
) -> Option<PlaybackStateRecord> {
    match feed.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
