use std::fmt;
use std::sync::Arc;

use super::Reconciler;
use super::Recorder;
use crate::dispatch::Registration;
use crate::source::HasSynced;
use crate::BackoffPolicy;
use crate::ControllerSettings;
use crate::RateLimiter;
use crate::RuntimeConfig;

/// Everything needed to construct a [`Controller`](super::Controller).
///
/// Plain data: fill the fields and hand the value to
/// [`Controller::new`](super::Controller::new), which validates it.
///
/// ```ignore
/// let mut options = ControllerOptions::new("pods");
/// options.reconciler = Some(Arc::new(|_ctx: SyncContext, req: SyncRequest| async move {
///     tracing::info!(key = %req.key, "reconciling");
///     Ok(())
/// }));
/// options.registrations.push(Box::new(
///     SourceRegistration::new(vec![pods.clone()]).with_keys(|p: &Pod| vec![p.key()]),
/// ));
/// let controller = Controller::new(options)?;
/// ```
pub struct ControllerOptions {
    pub name: String,

    /// Required
    pub reconciler: Option<Arc<dyn Reconciler>>,

    /// Sources whose events are dispatched to the queue
    pub registrations: Vec<Box<dyn Registration>>,

    /// Sources only waited on for readiness; their handlers are wired elsewhere
    pub bare_sources: Vec<Arc<dyn HasSynced>>,

    pub runtime: RuntimeConfig,

    /// Ignored when `rate_limiter` is set
    pub backoff: BackoffPolicy,

    /// Overrides the exponential backoff derived from `backoff`
    pub rate_limiter: Option<Arc<dyn RateLimiter>>,

    /// Defaults to [`TracingRecorder`](super::TracingRecorder)
    pub recorder: Option<Arc<dyn Recorder>>,
}

impl fmt::Debug for ControllerOptions {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ControllerOptions")
            .field("name", &self.name)
            .field("reconciler", &self.reconciler.is_some())
            .field("registrations", &self.registrations.len())
            .field("bare_sources", &self.bare_sources.len())
            .field("runtime", &self.runtime)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl ControllerOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reconciler: None,
            registrations: Vec::new(),
            bare_sources: Vec::new(),
            runtime: RuntimeConfig::default(),
            backoff: BackoffPolicy::default(),
            rate_limiter: None,
            recorder: None,
        }
    }

    /// Options carrying the runtime and backoff sections of `settings`.
    pub fn from_settings(
        name: impl Into<String>,
        settings: &ControllerSettings,
    ) -> Self {
        let mut options = Self::new(name);
        options.runtime = settings.runtime.clone();
        options.backoff = settings.backoff;
        options
    }
}
