use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::Recorder;
use crate::QueueKey;
use crate::Result;
use crate::WorkQueue;

/// Why a key reached the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// A dispatched event or an explicit enqueue
    Event,
    /// The periodic resync timer asked for this key, possibly coalesced with
    /// events for the same key
    Resync,
}

/// Argument of one reconcile invocation. Carries no object payload; the
/// reconciler reads current state from its own caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub key: QueueKey,
    pub controller: String,
    pub trigger: SyncTrigger,
    /// Consecutive failed attempts for this key before this one
    pub retries: u32,
}

impl SyncRequest {
    pub fn is_resync(&self) -> bool {
        self.trigger == SyncTrigger::Resync
    }
}

/// Controller facilities available to a reconciler.
#[derive(Clone)]
pub struct SyncContext {
    name: Arc<str>,
    queue: Arc<WorkQueue>,
    recorder: Arc<dyn Recorder>,
    token: CancellationToken,
}

impl fmt::Debug for SyncContext {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SyncContext")
            .field("name", &self.name)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

impl SyncContext {
    pub(crate) fn new(
        name: Arc<str>,
        queue: Arc<WorkQueue>,
        recorder: Arc<dyn Recorder>,
        token: CancellationToken,
    ) -> Self {
        Self {
            name,
            queue,
            recorder,
            token,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The controller's queue, for enqueueing follow-up keys.
    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    pub fn recorder(&self) -> &Arc<dyn Recorder> {
        &self.recorder
    }

    /// Fires when the controller starts draining. Polling it is optional;
    /// in-flight reconciles are never interrupted.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// User-supplied reconciliation logic.
///
/// Invoked concurrently for different keys, never concurrently for the same
/// key. An `Err` requeues the key with backoff; `Ok` resets its backoff.
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    async fn reconcile(
        &self,
        ctx: SyncContext,
        request: SyncRequest,
    ) -> Result<()>;
}

#[async_trait]
impl<F, Fut> Reconciler for F
where
    F: Fn(SyncContext, SyncRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn reconcile(
        &self,
        ctx: SyncContext,
        request: SyncRequest,
    ) -> Result<()> {
        (self)(ctx, request).await
    }
}
