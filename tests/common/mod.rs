#![allow(dead_code)]

use anyhow::{bail, Result};
use cowatch::config::SyncSettings;
use cowatch::player::{
    HeadlessWidgetHost, ManifestLoader, MediaSurface, PlayerEnv, Playhead, WidgetController,
    WidgetHost, WidgetRuntime,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const STREAM_URL: &str = "https://cdn.example.com/live/master.m3u8";
pub const VOD_URL: &str = "https://cdn.example.com/vod/movie.m3u8";
pub const WIDGET_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

const LIVE_PLAYLIST: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:6
#EXTINF:6.0,
seg0.ts
#EXTINF:6.0,
seg1.ts
";

const VOD_PLAYLIST: &str = "#EXTM3U
#EXT-X-TARGETDURATION:300
#EXT-X-PLAYLIST-TYPE:VOD
#EXTINF:300.0,
part0.ts
#EXTINF:300.0,
part1.ts
#EXT-X-ENDLIST
";

/// Serves canned playlists: `vod` URLs end-list at 600s, everything else is live
pub struct StaticManifestLoader;

#[async_trait::async_trait]
impl ManifestLoader for StaticManifestLoader {
    async fn fetch(&self, url: &str) -> Result<String> {
        if url.contains("missing") {
            bail!("HTTP 404 for {}", url);
        }
        if url.contains("/vod/") {
            Ok(VOD_PLAYLIST.to_string())
        } else {
            Ok(LIVE_PLAYLIST.to_string())
        }
    }
}

/// Canned playlists plus a count of every fetch
#[derive(Default)]
pub struct CountingManifestLoader {
    pub fetches: AtomicUsize,
}

#[async_trait::async_trait]
impl ManifestLoader for CountingManifestLoader {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        StaticManifestLoader.fetch(url).await
    }
}

/// Playhead whose `play` is refused while `refusals` is non-zero, like a browser
/// blocking autoplay right after leaving picture-in-picture
pub struct FlakySurface {
    playhead: Playhead,
    refusals: Arc<AtomicUsize>,
}

impl MediaSurface for FlakySurface {
    fn attach_source(&mut self, url: &str, duration: Option<f64>) {
        self.playhead.attach_source(url, duration);
    }

    fn detach(&mut self) {
        self.playhead.detach();
    }

    fn play(&mut self) -> Result<()> {
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            bail!("play() was refused");
        }
        self.playhead.play()
    }

    fn pause(&mut self) {
        self.playhead.pause();
    }

    fn seek(&mut self, seconds: f64) {
        self.playhead.seek(seconds);
    }

    fn current_time(&self) -> f64 {
        self.playhead.current_time()
    }

    fn is_paused(&self) -> bool {
        self.playhead.is_paused()
    }

    fn duration(&self) -> Option<f64> {
        self.playhead.duration()
    }
}

/// Widget host whose API script never loads
#[derive(Default)]
pub struct FailingWidgetHost {
    pub loads: AtomicUsize,
}

#[async_trait::async_trait]
impl WidgetHost for FailingWidgetHost {
    async fn load_api(&self) -> Result<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        bail!("script blocked")
    }

    async fn create_player(&self, _video_id: &str) -> Result<Box<dyn WidgetController>> {
        bail!("widget API not loaded")
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Headless widget host whose API takes a while to become available
pub struct SlowWidgetHost {
    pub delay: Duration,
    pub loads: AtomicUsize,
    inner: HeadlessWidgetHost,
}

impl SlowWidgetHost {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            loads: AtomicUsize::new(0),
            inner: HeadlessWidgetHost::new(),
        }
    }
}

#[async_trait::async_trait]
impl WidgetHost for SlowWidgetHost {
    async fn load_api(&self) -> Result<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn create_player(&self, video_id: &str) -> Result<Box<dyn WidgetController>> {
        self.inner.create_player(video_id).await
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Player environment with canned manifests, flaky surfaces and a private widget runtime
pub fn test_env(widget_host: Arc<dyn WidgetHost>, refusals: Arc<AtomicUsize>) -> PlayerEnv {
    PlayerEnv {
        manifest_loader: Arc::new(StaticManifestLoader),
        surface_factory: Arc::new(move || {
            Box::new(FlakySurface {
                playhead: Playhead::new(),
                refusals: Arc::clone(&refusals),
            }) as Box<dyn MediaSurface>
        }),
        widget_runtime: WidgetRuntime::new(widget_host),
        widget_poll_interval: Duration::from_millis(20),
    }
}

/// Headless environment fetching manifests through `loader`
pub fn env_with_loader(loader: Arc<dyn ManifestLoader>) -> PlayerEnv {
    PlayerEnv {
        manifest_loader: loader,
        ..headless_env()
    }
}

pub fn headless_env() -> PlayerEnv {
    test_env(
        Arc::new(HeadlessWidgetHost::new()),
        Arc::new(AtomicUsize::new(0)),
    )
}

pub fn fast_settings() -> SyncSettings {
    SyncSettings {
        sample_interval_ms: 50,
        pip_resume_backoff_ms: 10,
        ..SyncSettings::default()
    }
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
