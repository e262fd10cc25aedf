//! A generic reconciliation-controller runtime.
//!
//! Change notifications from one or more [`EventSource`]s are filtered and
//! mapped to keys by dispatchers, deduplicated by a [`WorkQueue`], and
//! drained by a pool of workers that invoke a user-supplied [`Reconciler`]
//! once sources report ready. Failed keys come back with exponential
//! backoff; an optional timer resyncs keys independent of event traffic.
//!
//! ```ignore
//! let pods = Arc::new(MemorySource::new(|p: &Pod| p.name.clone()));
//!
//! let mut options = ControllerOptions::from_settings("pods", &ControllerSettings::new()?);
//! options.reconciler = Some(Arc::new(|_ctx: SyncContext, req: SyncRequest| async move {
//!     tracing::info!(key = %req.key, "reconciling");
//!     Ok(())
//! }));
//! options.registrations.push(Box::new(
//!     SourceRegistration::new(vec![pods.clone()]).with_keys(|p: &Pod| vec![p.name.clone()]),
//! ));
//!
//! let controller = Controller::new(options)?;
//! controller.run(2, CancellationToken::new()).await?;
//! ```

mod config;
mod controller;
mod dispatch;
mod errors;
mod metrics;
mod queue;
mod readiness;
mod source;
mod utils;

pub use config::*;
pub use controller::*;
pub use dispatch::*;
pub use errors::*;
pub use metrics::*;
pub use queue::*;
pub use readiness::*;
pub use source::*;
