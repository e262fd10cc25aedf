//! Controller Runtime Error Hierarchy
//!
//! Only configuration problems and readiness timeouts ever leave
//! [`Controller::run`](crate::Controller::run) as errors. Per-key sync
//! failures are absorbed by the work queue's retry mechanism and reported
//! through the [`Recorder`](crate::Recorder).

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Settings loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Controller construction and lifecycle failures
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Per-key reconciliation failures
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// No reconciler was supplied in the options
    #[error("controller {0:?} has no reconciler")]
    MissingReconciler(String),

    #[error("controller name must not be empty")]
    EmptyName,

    /// The same source appears more than once across registrations
    #[error("controller {controller:?}: source #{index} is registered more than once")]
    DuplicateSource { controller: String, index: usize },

    #[error("worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    /// Readiness predicates did not all turn true in time
    #[error("controller {controller:?} timed out after {timeout:?} waiting for caches to sync")]
    CacheSyncTimeout { controller: String, timeout: Duration },

    #[error("controller {0:?} is already running")]
    AlreadyRunning(String),

    /// The work queue has been shut down; the controller cannot run again
    #[error("controller {0:?} has been shut down")]
    ShutDown(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("sync failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Source(Box<dyn std::error::Error + Send + Sync>),

    /// The reconcile future panicked; produced by the worker, never by user code
    #[error("sync panicked: {0}")]
    Panicked(String),
}

impl SyncError {
    pub fn failed(reason: impl Into<String>) -> Self {
        SyncError::Failed(reason.into())
    }

    pub fn from_source<E>(e: E) -> Self
    where E: std::error::Error + Send + Sync + 'static {
        SyncError::Source(Box::new(e))
    }
}
