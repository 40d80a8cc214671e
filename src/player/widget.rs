//! Embedded third-party widget backend
//!
//! The widget's control API is loaded once per process. Every widget player waits
//! on the shared `WidgetRuntime` readiness signal; control calls issued before the
//! widget is ready are recorded and applied once it is.

use super::backend::{emit, PlayerBackend, PlayerEvent, EVENT_BUFFER};
use super::source::{widget_video_id, MediaKind};
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Loader and factory for the third-party widget API
#[async_trait::async_trait]
pub trait WidgetHost: Send + Sync {
    /// Load the widget API script; called at most once per runtime
    async fn load_api(&self) -> Result<()>;

    /// Create a player for a hosted video
    async fn create_player(&self, video_id: &str) -> Result<Box<dyn WidgetController>>;

    fn name(&self) -> &str;
}

/// Control API of one widget instance
#[async_trait::async_trait]
pub trait WidgetController: Send + Sync {
    async fn play(&mut self) -> Result<()>;
    async fn pause(&mut self) -> Result<()>;
    async fn seek_to(&mut self, seconds: f64) -> Result<()>;
    async fn current_time(&self) -> Result<f64>;
    async fn duration(&self) -> Option<f64>;
    async fn is_paused(&self) -> bool;
    async fn destroy(&mut self);
}

/// Load state of the widget API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ApiStatus {
    NotLoaded,
    Loading,
    Ready,
    Failed(String),
}

static GLOBAL_RUNTIME: OnceLock<Arc<WidgetRuntime>> = OnceLock::new();

/// Process-wide widget API state with init-once semantics
pub struct WidgetRuntime {
    host: Arc<dyn WidgetHost>,
    status: watch::Sender<ApiStatus>,
    started: AtomicBool,
}

impl WidgetRuntime {
    pub fn new(host: Arc<dyn WidgetHost>) -> Arc<Self> {
        Arc::new(Self {
            host,
            status: watch::channel(ApiStatus::NotLoaded).0,
            started: AtomicBool::new(false),
        })
    }

    /// Install the process-wide runtime. The first host installed wins.
    pub fn install_global(host: Arc<dyn WidgetHost>) -> Arc<Self> {
        GLOBAL_RUNTIME.get_or_init(|| Self::new(host)).clone()
    }

    pub fn global() -> Option<Arc<Self>> {
        GLOBAL_RUNTIME.get().cloned()
    }

    pub fn host(&self) -> Arc<dyn WidgetHost> {
        Arc::clone(&self.host)
    }

    pub fn status(&self) -> ApiStatus {
        self.status.borrow().clone()
    }

    /// Start loading the API unless a load already started. Never retried.
    pub fn ensure_loaded(self: &Arc<Self>) {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        info!("Loading widget API via {}", self.host.name());
        self.status.send_replace(ApiStatus::Loading);

        let runtime = Arc::clone(self);
        tokio::spawn(async move {
            match runtime.host.load_api().await {
                Ok(()) => {
                    info!("Widget API ready");
                    runtime.status.send_replace(ApiStatus::Ready);
                }
                Err(e) => {
                    error!("Widget API failed to load: {:#}", e);
                    runtime.status.send_replace(ApiStatus::Failed(format!("{:#}", e)));
                }
            }
        });
    }

    /// Wait until the API is ready (starting the load if needed)
    pub async fn ready(self: &Arc<Self>) -> Result<()> {
        self.ensure_loaded();

        let mut rx = self.status.subscribe();
        let status = rx
            .wait_for(|s| matches!(s, ApiStatus::Ready | ApiStatus::Failed(_)))
            .await
            .map_err(|_| anyhow!("Widget runtime dropped"))?
            .clone();

        match status {
            ApiStatus::Ready => Ok(()),
            ApiStatus::Failed(reason) => Err(anyhow!("Widget API unavailable: {}", reason)),
            other => Err(anyhow!("Widget API in unexpected state {:?}", other)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PendingControls {
    playing: Option<bool>,
    seek: Option<f64>,
}

#[derive(Default)]
struct WidgetSlot {
    controller: Option<Box<dyn WidgetController>>,
    pending: PendingControls,
}

/// Embedded-widget backend
pub struct EmbeddedWidgetPlayer {
    runtime: Arc<WidgetRuntime>,
    poll_interval: Duration,
    /// Poll the playhead and report `TimeUpdate`s (owner sessions only)
    poll_time: bool,
    events: Option<mpsc::Sender<PlayerEvent>>,
    slot: Arc<Mutex<WidgetSlot>>,
    ready: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl EmbeddedWidgetPlayer {
    pub fn new(runtime: Arc<WidgetRuntime>, poll_interval: Duration, poll_time: bool) -> Self {
        Self {
            runtime,
            poll_interval,
            poll_time,
            events: None,
            slot: Arc::new(Mutex::new(WidgetSlot::default())),
            ready: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    async fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        self.ready.store(false, Ordering::SeqCst);

        let mut slot = self.slot.lock().await;
        if let Some(mut controller) = slot.controller.take() {
            controller.destroy().await;
        }
        slot.pending = PendingControls::default();
    }
}

/// Waits for the API, creates the widget, flushes deferred controls, then polls
async fn run_widget(
    runtime: Arc<WidgetRuntime>,
    video_id: String,
    slot: Arc<Mutex<WidgetSlot>>,
    ready: Arc<AtomicBool>,
    events: Option<mpsc::Sender<PlayerEvent>>,
    poll: Option<Duration>,
) {
    if let Err(e) = runtime.ready().await {
        warn!("Widget {} stays disabled: {:#}", video_id, e);
        emit(&events, PlayerEvent::Error(format!("{:#}", e)));
        return;
    }

    let mut controller = match runtime.host().create_player(&video_id).await {
        Ok(controller) => controller,
        Err(e) => {
            error!("Failed to create widget for {}: {:#}", video_id, e);
            emit(&events, PlayerEvent::Error(format!("{:#}", e)));
            return;
        }
    };

    let duration = {
        let mut slot = slot.lock().await;
        let pending = std::mem::take(&mut slot.pending);

        if let Some(seconds) = pending.seek {
            if let Err(e) = controller.seek_to(seconds).await {
                warn!("Deferred seek failed: {:#}", e);
            }
        }
        match pending.playing {
            Some(true) => {
                if let Err(e) = controller.play().await {
                    warn!("Deferred play failed: {:#}", e);
                }
            }
            Some(false) => {
                if let Err(e) = controller.pause().await {
                    warn!("Deferred pause failed: {:#}", e);
                }
            }
            None => {}
        }

        let duration = controller.duration().await;
        slot.controller = Some(controller);
        duration
    };

    ready.store(true, Ordering::SeqCst);
    info!("Widget {} ready", video_id);
    emit(&events, PlayerEvent::Ready { duration });

    let Some(period) = poll else {
        return;
    };

    // The widget API has no time events; sample the playhead instead
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;

        let time = {
            let slot = slot.lock().await;
            match slot.controller.as_ref() {
                Some(controller) => controller.current_time().await,
                None => break,
            }
        };

        match time {
            Ok(t) => emit(&events, PlayerEvent::TimeUpdate(t)),
            Err(e) => debug!("Widget time poll failed: {:#}", e),
        }
    }
}

#[async_trait::async_trait]
impl PlayerBackend for EmbeddedWidgetPlayer {
    fn attach(&mut self) -> mpsc::Receiver<PlayerEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        self.events = Some(tx);
        rx
    }

    async fn load_source(&mut self, url: &str) -> Result<()> {
        let video_id = widget_video_id(url)
            .ok_or_else(|| anyhow!("Not a recognized widget URL: {}", url))?;

        self.release().await;

        info!("Loading widget video {} (poll_time={})", video_id, self.poll_time);

        let poll = self.poll_time.then_some(self.poll_interval);
        self.task = Some(tokio::spawn(run_widget(
            Arc::clone(&self.runtime),
            video_id,
            Arc::clone(&self.slot),
            Arc::clone(&self.ready),
            self.events.clone(),
            poll,
        )));

        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        match slot.controller.as_mut() {
            Some(controller) => controller.play().await,
            None => {
                slot.pending.playing = Some(true);
                Ok(())
            }
        }
    }

    async fn pause(&mut self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        match slot.controller.as_mut() {
            Some(controller) => controller.pause().await,
            None => {
                slot.pending.playing = Some(false);
                Ok(())
            }
        }
    }

    async fn seek(&mut self, seconds: f64) -> Result<()> {
        let seconds = seconds.max(0.0);
        let mut slot = self.slot.lock().await;
        match slot.controller.as_mut() {
            Some(controller) => controller.seek_to(seconds).await,
            None => {
                slot.pending.seek = Some(seconds);
                Ok(())
            }
        }
    }

    async fn current_time(&self) -> f64 {
        let slot = self.slot.lock().await;
        match slot.controller.as_ref() {
            Some(controller) => controller.current_time().await.unwrap_or(0.0),
            None => slot.pending.seek.unwrap_or(0.0),
        }
    }

    async fn duration(&self) -> Option<f64> {
        let slot = self.slot.lock().await;
        match slot.controller.as_ref() {
            Some(controller) => controller.duration().await,
            None => None,
        }
    }

    async fn is_paused(&self) -> bool {
        let slot = self.slot.lock().await;
        match slot.controller.as_ref() {
            Some(controller) => controller.is_paused().await,
            None => !slot.pending.playing.unwrap_or(false),
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn kind(&self) -> MediaKind {
        MediaKind::EmbeddedWidget
    }

    async fn destroy(&mut self) {
        self.release().await;
        self.events = None;
        info!("Embedded widget player destroyed");
    }

    fn name(&self) -> &str {
        "embedded-widget"
    }
}
