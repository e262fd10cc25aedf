use std::fmt;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Queue key used by controllers that only need a level trigger.
pub const DEFAULT_QUEUE_KEY: &str = "key";

/// What the periodic resync timer puts on the queue.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResyncPolicy {
    /// Enqueue the default queue key only
    #[default]
    DefaultKey,

    /// Re-enqueue every key the dispatchers have produced and not seen deleted.
    /// Falls back to the default key while no key is known.
    AllKnownKeys,
}

impl fmt::Display for ResyncPolicy {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ResyncPolicy::DefaultKey => write!(f, "default_key"),
            ResyncPolicy::AllKnownKeys => write!(f, "all_known_keys"),
        }
    }
}

/// Worker loop, readiness and resync timing
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Number of concurrent workers the binary starts the controller with
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// How long `run` waits for every source to report synced (milliseconds)
    #[serde(default = "default_cache_sync_timeout_ms")]
    pub cache_sync_timeout_ms: u64,

    /// How often readiness predicates are re-evaluated (milliseconds)
    #[serde(default = "default_cache_sync_poll_interval_ms")]
    pub cache_sync_poll_interval_ms: u64,

    /// Periodic resync interval (milliseconds). 0 disables resync.
    #[serde(default)]
    pub resync_interval_ms: u64,

    #[serde(default)]
    pub resync_policy: ResyncPolicy,

    /// Key emitted for registrations without a key extractor and by
    /// the resync timer
    #[serde(default = "default_queue_key")]
    pub default_queue_key: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            cache_sync_timeout_ms: default_cache_sync_timeout_ms(),
            cache_sync_poll_interval_ms: default_cache_sync_poll_interval_ms(),
            resync_interval_ms: 0,
            resync_policy: ResyncPolicy::default(),
            default_queue_key: default_queue_key(),
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config(ConfigError::Message(
                "runtime.workers must be at least 1".into(),
            )));
        }

        if self.cache_sync_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "runtime.cache_sync_timeout_ms must be greater than 0".into(),
            )));
        }

        if self.cache_sync_poll_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "runtime.cache_sync_poll_interval_ms must be greater than 0".into(),
            )));
        }

        if self.default_queue_key.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "runtime.default_queue_key must not be empty".into(),
            )));
        }

        Ok(())
    }

    pub fn cache_sync_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_sync_timeout_ms)
    }

    pub fn cache_sync_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cache_sync_poll_interval_ms)
    }

    /// `None` when resync is disabled
    pub fn resync_interval(&self) -> Option<Duration> {
        (self.resync_interval_ms > 0).then(|| Duration::from_millis(self.resync_interval_ms))
    }
}

fn default_workers() -> usize {
    1
}
// 10 minutes
fn default_cache_sync_timeout_ms() -> u64 {
    600_000
}
fn default_cache_sync_poll_interval_ms() -> u64 {
    100
}
fn default_queue_key() -> String {
    DEFAULT_QUEUE_KEY.to_string()
}
