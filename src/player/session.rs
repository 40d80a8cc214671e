use super::adapter::{PlayerAdapter, PlayerEnv};
use super::backend::{PlayerBackend, PlayerEvent};
use super::source::MediaKind;
use crate::room::Role;
use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Per-client player state (never persisted)
///
/// Owns at most one adapter and its event listener. Replacing the source, or
/// tearing the session down, destroys the adapter and drops its listener so no
/// event from a previous source is ever observed.
pub struct PlayerSession {
    env: PlayerEnv,
    role: Role,
    adapter: Option<PlayerAdapter>,
    events: Option<mpsc::Receiver<PlayerEvent>>,
    source_url: Option<String>,
    load_error: Option<String>,

    /// `updated_at` of the last authoritative update this session applied
    pub last_applied_updated_at: Option<DateTime<Utc>>,
}

impl PlayerSession {
    pub fn new(env: PlayerEnv, role: Role) -> Self {
        Self {
            env,
            role,
            adapter: None,
            events: None,
            source_url: None,
            load_error: None,
            last_applied_updated_at: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn media_kind(&self) -> Option<MediaKind> {
        self.adapter.as_ref().map(|a| a.kind())
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn adapter(&self) -> Option<&PlayerAdapter> {
        self.adapter.as_ref()
    }

    /// The adapter, only once its source accepts controls
    pub fn ready_adapter_mut(&mut self) -> Option<&mut PlayerAdapter> {
        self.adapter.as_mut().filter(|a| a.is_ready())
    }

    pub fn is_ready(&self) -> bool {
        self.adapter.as_ref().is_some_and(|a| a.is_ready())
    }

    /// Switch to `url`, rebuilding the adapter from scratch.
    ///
    /// Returns `false` when the same source is already loaded, or already failed to
    /// load: a failed source stays failed until the URL changes or `reload` is called.
    /// On load failure the adapter is destroyed and the error is kept for display.
    pub async fn set_source(&mut self, url: Option<&str>) -> Result<bool> {
        if url == self.source_url.as_deref()
            && (self.adapter.is_some() || self.load_error.is_some() || url.is_none())
        {
            return Ok(false);
        }

        self.teardown().await;
        self.source_url = url.map(str::to_string);
        self.load_error = None;

        let Some(url) = url else {
            info!("Source cleared");
            return Ok(true);
        };

        self.build(url.to_string()).await?;
        Ok(true)
    }

    /// Rebuild the current source even if it failed before
    pub async fn reload(&mut self) -> Result<bool> {
        let Some(url) = self.source_url.clone() else {
            return Ok(false);
        };

        info!("Reloading {}", url);
        self.teardown().await;
        self.load_error = None;
        self.build(url).await?;
        Ok(true)
    }

    async fn build(&mut self, url: String) -> Result<()> {
        let mut adapter = PlayerAdapter::for_source(&url, &self.env, self.role.is_owner());
        info!("Using {} backend for {}", adapter.name(), url);

        self.events = Some(adapter.attach());

        if let Err(e) = adapter.load_source(&url).await {
            adapter.destroy().await;
            self.events = None;
            self.load_error = Some(format!("{:#}", e));
            return Err(e);
        }

        self.adapter = Some(adapter);
        Ok(())
    }

    /// Next event from the current adapter; pending while there is none
    pub async fn next_event(&mut self) -> PlayerEvent {
        if let Some(rx) = self.events.as_mut() {
            if let Some(event) = rx.recv().await {
                return event;
            }
            self.events = None;
        }
        std::future::pending().await
    }

    /// Session-level bookkeeping for an adapter event
    ///
    /// An error leaves no half-initialized player behind.
    pub async fn handle_event(&mut self, event: &PlayerEvent) {
        if let PlayerEvent::Error(message) = event {
            warn!(
                "Player error for {}: {}",
                self.source_url.as_deref().unwrap_or("<none>"),
                message
            );
            self.teardown().await;
            self.load_error = Some(message.clone());
        }
    }

    /// Destroy the adapter and stop listening to it
    pub async fn teardown(&mut self) {
        self.events = None;
        if let Some(mut adapter) = self.adapter.take() {
            info!("Tearing down {} backend", adapter.name());
            adapter.destroy().await;
        }
    }
}
