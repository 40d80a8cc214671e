use super::source::MediaKind;
use anyhow::Result;
use tokio::sync::mpsc;

/// Events buffered per adapter before new ones are dropped
pub const EVENT_BUFFER: usize = 32;

/// Lifecycle events reported by a backend
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Source is loaded and accepts play/seek
    Ready { duration: Option<f64> },
    /// Load or playback failure; the adapter is no longer usable
    Error(String),
    /// Periodic playhead report (seconds)
    TimeUpdate(f64),
}

/// Uniform player control surface
///
/// Implementations:
/// - `AdaptiveStreamPlayer`: HLS manifest client + local media surface
/// - `EmbeddedWidgetPlayer`: third-party widget behind a shared, load-once API
/// - `PlayerAdapter`: tagged union dispatching to one of the above
#[async_trait::async_trait]
pub trait PlayerBackend: Send + Sync {
    /// Attach an event listener
    ///
    /// Returns the receiving end; a later `attach` or `destroy` closes it.
    fn attach(&mut self) -> mpsc::Receiver<PlayerEvent>;

    /// Load a new source
    async fn load_source(&mut self, url: &str) -> Result<()>;

    async fn play(&mut self) -> Result<()>;

    async fn pause(&mut self) -> Result<()>;

    /// Seek to an absolute position in seconds
    async fn seek(&mut self, seconds: f64) -> Result<()>;

    /// Current playhead in seconds
    async fn current_time(&self) -> f64;

    /// Media duration in seconds, if known
    async fn duration(&self) -> Option<f64>;

    async fn is_paused(&self) -> bool;

    /// Whether the source finished loading and controls take effect
    fn is_ready(&self) -> bool;

    fn kind(&self) -> MediaKind;

    /// Release listeners, timers and the underlying player
    async fn destroy(&mut self);

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Local media element an adaptive stream renders into
pub trait MediaSurface: Send + Sync {
    /// Bind a resolved media source; resets the playhead to 0, paused
    fn attach_source(&mut self, url: &str, duration: Option<f64>);

    /// Unbind the current source
    fn detach(&mut self);

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn seek(&mut self, seconds: f64);

    fn current_time(&self) -> f64;

    fn is_paused(&self) -> bool;

    fn duration(&self) -> Option<f64>;
}

pub(crate) fn emit(events: &Option<mpsc::Sender<PlayerEvent>>, event: PlayerEvent) {
    if let Some(tx) = events {
        if let Err(e) = tx.try_send(event) {
            tracing::debug!("Dropped player event: {}", e);
        }
    }
}
