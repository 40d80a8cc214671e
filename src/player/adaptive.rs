use super::backend::{emit, MediaSurface, PlayerBackend, PlayerEvent, EVENT_BUFFER};
use super::hls::{load_manifest, Manifest, ManifestLoader};
use super::source::MediaKind;
use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Cadence of `TimeUpdate` events while the surface is playing
pub const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Adaptive-stream backend: HLS manifest client driving a local media surface
///
/// Play and seek are refused until the manifest has been parsed.
pub struct AdaptiveStreamPlayer {
    loader: Arc<dyn ManifestLoader>,
    surface: Arc<Mutex<Box<dyn MediaSurface>>>,
    events: Option<mpsc::Sender<PlayerEvent>>,
    manifest: Option<Manifest>,
    /// Reports the playhead while a source is attached
    ticker: Option<JoinHandle<()>>,
}

impl AdaptiveStreamPlayer {
    pub fn new(loader: Arc<dyn ManifestLoader>, surface: Box<dyn MediaSurface>) -> Self {
        Self {
            loader,
            surface: Arc::new(Mutex::new(surface)),
            events: None,
            manifest: None,
            ticker: None,
        }
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.manifest.is_none() {
            bail!("Stream not ready: manifest not parsed yet");
        }
        Ok(())
    }

    fn stop_ticker(&mut self) {
        if let Some(task) = self.ticker.take() {
            task.abort();
        }
    }
}

/// Emits the playhead on every tick while the surface plays
async fn run_time_updates(
    surface: Arc<Mutex<Box<dyn MediaSurface>>>,
    events: Option<mpsc::Sender<PlayerEvent>>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;

        let time = {
            let surface = surface.lock().await;
            if surface.is_paused() {
                None
            } else {
                Some(surface.current_time())
            }
        };

        if let Some(t) = time {
            emit(&events, PlayerEvent::TimeUpdate(t));
        }
    }
}

#[async_trait::async_trait]
impl PlayerBackend for AdaptiveStreamPlayer {
    fn attach(&mut self) -> mpsc::Receiver<PlayerEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        self.events = Some(tx);
        rx
    }

    async fn load_source(&mut self, url: &str) -> Result<()> {
        info!("Loading adaptive stream {}", url);

        self.stop_ticker();
        self.manifest = None;
        self.surface.lock().await.detach();

        match load_manifest(self.loader.as_ref(), url).await {
            Ok(manifest) => {
                let duration = manifest.duration();
                self.surface
                    .lock()
                    .await
                    .attach_source(&manifest.media_url, duration);
                self.manifest = Some(manifest);

                info!("Manifest parsed for {} (duration={:?})", url, duration);
                emit(&self.events, PlayerEvent::Ready { duration });

                self.ticker = Some(tokio::spawn(run_time_updates(
                    Arc::clone(&self.surface),
                    self.events.clone(),
                    TIME_UPDATE_INTERVAL,
                )));
                Ok(())
            }
            Err(e) => {
                error!("Failed to load stream {}: {:#}", url, e);
                emit(&self.events, PlayerEvent::Error(format!("{:#}", e)));
                Err(e)
            }
        }
    }

    async fn play(&mut self) -> Result<()> {
        self.ensure_ready()?;
        self.surface.lock().await.play()
    }

    async fn pause(&mut self) -> Result<()> {
        self.ensure_ready()?;
        self.surface.lock().await.pause();
        Ok(())
    }

    async fn seek(&mut self, seconds: f64) -> Result<()> {
        self.ensure_ready()?;
        self.surface.lock().await.seek(seconds.max(0.0));
        Ok(())
    }

    async fn current_time(&self) -> f64 {
        if self.manifest.is_some() {
            self.surface.lock().await.current_time()
        } else {
            0.0
        }
    }

    async fn duration(&self) -> Option<f64> {
        self.manifest.as_ref().and_then(Manifest::duration)
    }

    async fn is_paused(&self) -> bool {
        self.manifest.is_none() || self.surface.lock().await.is_paused()
    }

    fn is_ready(&self) -> bool {
        self.manifest.is_some()
    }

    fn kind(&self) -> MediaKind {
        MediaKind::AdaptiveStream
    }

    async fn destroy(&mut self) {
        self.stop_ticker();
        self.surface.lock().await.detach();
        self.manifest = None;
        self.events = None;
        info!("Adaptive stream player destroyed");
    }

    fn name(&self) -> &str {
        "adaptive-stream"
    }
}
