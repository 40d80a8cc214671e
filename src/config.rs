use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub nats: NatsConfig,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    pub rooms_bucket: String,
    pub state_bucket: String,
}

/// Timing knobs of the sync protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Owner position sampling period while playing
    pub sample_interval_ms: u64,

    /// Viewer drift tolerated before seeking
    pub drift_threshold_secs: f64,

    /// Cap on elapsed time credited on initial sync
    pub initial_sync_grace_secs: f64,

    /// Owner-side widget playhead polling period
    pub widget_poll_interval_ms: u64,

    /// Play attempts after leaving picture-in-picture
    pub pip_resume_attempts: u32,

    /// Delay before the second attempt; doubles each retry
    pub pip_resume_backoff_ms: u64,

    /// Manifest request timeout
    pub manifest_timeout_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sample_interval_ms: 4000,
            drift_threshold_secs: 1.5,
            initial_sync_grace_secs: crate::clock::DEFAULT_GRACE_WINDOW_SECS,
            widget_poll_interval_ms: 500,
            pip_resume_attempts: 3,
            pip_resume_backoff_ms: 250,
            manifest_timeout_ms: 10_000,
        }
    }
}

impl SyncSettings {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }

    pub fn widget_poll_interval(&self) -> Duration {
        Duration::from_millis(self.widget_poll_interval_ms.max(1))
    }

    pub fn pip_resume_backoff(&self) -> Duration {
        Duration::from_millis(self.pip_resume_backoff_ms)
    }

    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_millis(self.manifest_timeout_ms)
    }
}

impl Config {
    /// Load from a config file, then `COWATCH__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("COWATCH").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
