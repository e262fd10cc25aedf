use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use tracing::error;
use tracing::warn;

use crate::QueueKey;

/// Something worth reporting that does not stop the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// The reconciler returned an error; the key was requeued with backoff
    SyncFailed { key: QueueKey, reason: String },

    /// The reconciler panicked; handled like a failure
    SyncPanicked { key: QueueKey, reason: String },

    /// `run` gave up waiting for readiness
    CacheSyncTimeout { timeout: Duration },
}

/// Reporting channel for non-fatal controller events.
#[cfg_attr(test, automock)]
pub trait Recorder: Send + Sync + 'static {
    fn record(
        &self,
        controller: &str,
        event: RecorderEvent,
    );
}

/// Default recorder: reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl Recorder for TracingRecorder {
    fn record(
        &self,
        controller: &str,
        event: RecorderEvent,
    ) {
        match event {
            RecorderEvent::SyncFailed { key, reason } => {
                warn!(%controller, %key, %reason, "sync failed");
            }
            RecorderEvent::SyncPanicked { key, reason } => {
                error!(%controller, %key, %reason, "sync panicked");
            }
            RecorderEvent::CacheSyncTimeout { timeout } => {
                error!(%controller, ?timeout, "cache sync timed out");
            }
        }
    }
}

/// Keeps every event in memory; useful for assertions.
#[derive(Debug, Default)]
pub struct InMemoryRecorder {
    events: Mutex<Vec<(String, RecorderEvent)>>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, RecorderEvent)> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Recorder for InMemoryRecorder {
    fn record(
        &self,
        controller: &str,
        event: RecorderEvent,
    ) {
        self.events.lock().push((controller.to_string(), event));
    }
}
