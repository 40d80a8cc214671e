use crate::config::SyncSettings;
use crate::player::PlayerEnv;
use crate::session::RoomSession;
use crate::store::StateStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Joined rooms (session_id → session)
    pub sessions: Arc<RwLock<HashMap<String, Arc<RoomSession>>>>,

    /// Room directory and playback-state store
    pub store: Arc<dyn StateStore>,

    /// Player construction for new sessions
    pub env: PlayerEnv,

    /// Sync timing applied to new sessions
    pub sync: SyncSettings,
}

impl AppState {
    pub fn new(store: Arc<dyn StateStore>, env: PlayerEnv, sync: SyncSettings) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            store,
            env,
            sync,
        }
    }
}
