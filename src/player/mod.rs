//! Player backend adapters
//!
//! A uniform control surface over two playback backends:
//! - Adaptive stream: HLS manifests rendered on a local media surface
//! - Embedded widget: a third-party hosted player with an asynchronous API
//!
//! The backend is chosen once per source URL. Changing the source to the other
//! kind tears the adapter down and builds a new one.

pub mod adapter;
pub mod adaptive;
pub mod backend;
pub mod headless;
pub mod hls;
pub mod session;
pub mod source;
pub mod widget;

pub use adapter::{PlayerAdapter, PlayerEnv, SurfaceFactory};
pub use adaptive::AdaptiveStreamPlayer;
pub use backend::{MediaSurface, PlayerBackend, PlayerEvent};
pub use headless::{HeadlessWidgetHost, Playhead};
pub use hls::{HttpManifestLoader, Manifest, ManifestLoader};
pub use session::PlayerSession;
pub use source::{widget_video_id, MediaKind};
pub use widget::{ApiStatus, EmbeddedWidgetPlayer, WidgetController, WidgetHost, WidgetRuntime};
