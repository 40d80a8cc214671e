use super::adaptive::AdaptiveStreamPlayer;
use super::backend::{MediaSurface, PlayerBackend, PlayerEvent};
use super::headless::{HeadlessWidgetHost, Playhead};
use super::hls::{HttpManifestLoader, ManifestLoader};
use super::source::MediaKind;
use super::widget::{EmbeddedWidgetPlayer, WidgetRuntime};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Builds the local media surface for each adaptive-stream adapter
pub type SurfaceFactory = Arc<dyn Fn() -> Box<dyn MediaSurface> + Send + Sync>;

/// Everything needed to construct player adapters
#[derive(Clone)]
pub struct PlayerEnv {
    pub manifest_loader: Arc<dyn ManifestLoader>,
    pub surface_factory: SurfaceFactory,
    pub widget_runtime: Arc<WidgetRuntime>,
    /// Playhead polling period for owner-side widgets
    pub widget_poll_interval: Duration,
}

impl PlayerEnv {
    /// HTTP manifest loading, headless playheads and the process-wide widget runtime
    pub fn headless(widget_poll_interval: Duration, manifest_timeout: Duration) -> Result<Self> {
        Ok(Self {
            manifest_loader: Arc::new(HttpManifestLoader::new(manifest_timeout)?),
            surface_factory: Arc::new(|| Box::new(Playhead::new()) as Box<dyn MediaSurface>),
            widget_runtime: WidgetRuntime::install_global(Arc::new(HeadlessWidgetHost::new())),
            widget_poll_interval,
        })
    }
}

/// The backend chosen for one source URL
pub enum PlayerAdapter {
    Adaptive(AdaptiveStreamPlayer),
    Widget(EmbeddedWidgetPlayer),
}

impl PlayerAdapter {
    /// Pick the backend by URL shape. `poll_time` enables widget playhead polling.
    pub fn for_source(url: &str, env: &PlayerEnv, poll_time: bool) -> Self {
        match MediaKind::detect(url) {
            MediaKind::AdaptiveStream => PlayerAdapter::Adaptive(AdaptiveStreamPlayer::new(
                Arc::clone(&env.manifest_loader),
                (env.surface_factory)(),
            )),
            MediaKind::EmbeddedWidget => PlayerAdapter::Widget(EmbeddedWidgetPlayer::new(
                Arc::clone(&env.widget_runtime),
                env.widget_poll_interval,
                poll_time,
            )),
        }
    }

    fn backend(&self) -> &dyn PlayerBackend {
        match self {
            PlayerAdapter::Adaptive(p) => p,
            PlayerAdapter::Widget(p) => p,
        }
    }

    fn backend_mut(&mut self) -> &mut dyn PlayerBackend {
        match self {
            PlayerAdapter::Adaptive(p) => p,
            PlayerAdapter::Widget(p) => p,
        }
    }
}

#[async_trait::async_trait]
impl PlayerBackend for PlayerAdapter {
    fn attach(&mut self) -> mpsc::Receiver<PlayerEvent> {
        self.backend_mut().attach()
    }

    async fn load_source(&mut self, url: &str) -> Result<()> {
        self.backend_mut().load_source(url).await
    }

    async fn play(&mut self) -> Result<()> {
        self.backend_mut().play().await
    }

    async fn pause(&mut self) -> Result<()> {
        self.backend_mut().pause().await
    }

    async fn seek(&mut self, seconds: f64) -> Result<()> {
        self.backend_mut().seek(seconds).await
    }

    async fn current_time(&self) -> f64 {
        self.backend().current_time().await
    }

    async fn duration(&self) -> Option<f64> {
        self.backend().duration().await
    }

    async fn is_paused(&self) -> bool {
        self.backend().is_paused().await
    }

    fn is_ready(&self) -> bool {
        self.backend().is_ready()
    }

    fn kind(&self) -> MediaKind {
        self.backend().kind()
    }

    async fn destroy(&mut self) {
        self.backend_mut().destroy().await
    }

    fn name(&self) -> &str {
        self.backend().name()
    }
}
