pub mod clock;
pub mod config;
pub mod http;
pub mod player;
pub mod room;
pub mod session;
pub mod store;
pub mod sync;

pub use clock::{compute_target_position, drift_exceeds, SyncMode};
pub use config::{Config, SyncSettings};
pub use http::{create_router, AppState};
pub use player::{PlayerAdapter, PlayerBackend, PlayerEnv, PlayerEvent, PlayerSession};
pub use room::{PlaybackState, PlaybackStateRecord, Role, Room};
pub use session::{RoomSession, SessionCommand, SessionConfig, SessionPhase, SessionStatus};
pub use store::{MemoryStore, NatsStore, StateStore};
pub use sync::{OwnerController, OwnerPhase, SyncOutcome, SyncPhase, ViewerSynchronizer};
