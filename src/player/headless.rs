//! Headless playback surfaces used by the agent binary
//!
//! No frames are decoded; the playhead advances with the monotonic clock while
//! playing, which is all the sync protocol observes.

use super::backend::MediaSurface;
use super::widget::{WidgetController, WidgetHost};
use anyhow::{bail, Result};
use tokio::time::Instant;
use tracing::debug;

/// Virtual media element
#[derive(Debug, Default)]
pub struct Playhead {
    source: Option<String>,
    /// Position at `anchor`, or the frozen position while paused
    position: f64,
    /// Set while playing
    anchor: Option<Instant>,
    duration: Option<f64>,
}

impl Playhead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn clamp(&self, seconds: f64) -> f64 {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        match self.duration {
            Some(d) => seconds.min(d),
            None => seconds,
        }
    }

    fn ended(&self) -> bool {
        matches!(self.duration, Some(d) if self.current_time() >= d)
    }
}

impl MediaSurface for Playhead {
    fn attach_source(&mut self, url: &str, duration: Option<f64>) {
        self.source = Some(url.to_string());
        self.duration = duration;
        self.position = 0.0;
        self.anchor = None;
    }

    fn detach(&mut self) {
        *self = Self::default();
    }

    fn play(&mut self) -> Result<()> {
        if self.source.is_none() {
            bail!("No source attached");
        }
        if self.anchor.is_none() {
            self.anchor = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.position = self.current_time();
        self.anchor = None;
    }

    fn seek(&mut self, seconds: f64) {
        self.position = self.clamp(seconds);
        if self.anchor.is_some() {
            self.anchor = Some(Instant::now());
        }
    }

    fn current_time(&self) -> f64 {
        let elapsed = self
            .anchor
            .map(|a| a.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.clamp(self.position + elapsed)
    }

    fn is_paused(&self) -> bool {
        self.anchor.is_none() || self.ended()
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }
}

/// Widget host whose API is available immediately and whose players are playheads
#[derive(Debug, Default)]
pub struct HeadlessWidgetHost;

impl HeadlessWidgetHost {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl WidgetHost for HeadlessWidgetHost {
    async fn load_api(&self) -> Result<()> {
        Ok(())
    }

    async fn create_player(&self, video_id: &str) -> Result<Box<dyn WidgetController>> {
        debug!("Creating headless widget player for {}", video_id);
        let mut playhead = Playhead::new();
        playhead.attach_source(video_id, None);
        Ok(Box::new(HeadlessWidget { playhead }))
    }

    fn name(&self) -> &str {
        "headless"
    }
}

struct HeadlessWidget {
    playhead: Playhead,
}

#[async_trait::async_trait]
impl WidgetController for HeadlessWidget {
    async fn play(&mut self) -> Result<()> {
        self.playhead.play()
    }

    async fn pause(&mut self) -> Result<()> {
        self.playhead.pause();
        Ok(())
    }

    async fn seek_to(&mut self, seconds: f64) -> Result<()> {
        self.playhead.seek(seconds);
        Ok(())
    }

    async fn current_time(&self) -> Result<f64> {
        Ok(self.playhead.current_time())
    }

    async fn duration(&self) -> Option<f64> {
        self.playhead.duration()
    }

    async fn is_paused(&self) -> bool {
        self.playhead.is_paused()
    }

    async fn destroy(&mut self) {
        self.playhead.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_requires_source() {
        let mut playhead = Playhead::new();
        assert!(playhead.play().is_err());
        assert!(playhead.is_paused());
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let mut playhead = Playhead::new();
        playhead.attach_source("https://cdn.example.com/a.m3u8", Some(30.0));

        playhead.seek(-5.0);
        assert_eq!(playhead.current_time(), 0.0);

        playhead.seek(45.0);
        assert_eq!(playhead.current_time(), 30.0);

        // At the end of the media the element reports paused
        playhead.play().unwrap();
        assert!(playhead.is_paused());
    }

    #[test]
    fn test_pause_freezes_position() {
        let mut playhead = Playhead::new();
        playhead.attach_source("https://cdn.example.com/a.m3u8", None);
        playhead.seek(12.0);
        playhead.play().unwrap();
        assert!(!playhead.is_paused());

        playhead.pause();
        let frozen = playhead.current_time();
        assert!(frozen >= 12.0);
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(playhead.current_time(), frozen);
    }

    #[test]
    fn test_detach_resets() {
        let mut playhead = Playhead::new();
        playhead.attach_source("https://cdn.example.com/a.m3u8", Some(10.0));
        playhead.seek(5.0);
        playhead.detach();
        assert_eq!(playhead.source(), None);
        assert_eq!(playhead.current_time(), 0.0);
        assert_eq!(playhead.duration(), None);
    }
}
