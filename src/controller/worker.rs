use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::DashSet;
use futures::FutureExt;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use super::Reconciler;
use super::RecorderEvent;
use super::SyncContext;
use super::SyncRequest;
use super::SyncTrigger;
use crate::metrics::SYNC_DURATION;
use crate::metrics::SYNC_PANICS;
use crate::metrics::SYNC_TOTAL;
use crate::utils::panic_message;
use crate::Error;
use crate::QueueKey;
use crate::Result;
use crate::SyncError;
use crate::WorkQueue;

/// One consumer of the work queue.
pub(super) struct Worker {
    pub(super) id: usize,
    pub(super) ctx: SyncContext,
    pub(super) reconciler: Arc<dyn Reconciler>,
    pub(super) queue: Arc<WorkQueue>,
    /// Keys requested by the resync timer and not yet dequeued
    pub(super) resync_marks: Arc<DashSet<QueueKey>>,
}

impl Worker {
    pub(super) async fn run(self) -> Result<()> {
        debug!(controller = %self.ctx.name(), worker = self.id, "worker started");
        while self.process_next_work_item().await {}
        debug!(controller = %self.ctx.name(), worker = self.id, "worker stopped");
        Ok(())
    }

    /// Returns `false` once the queue is shutting down.
    async fn process_next_work_item(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };

        let trigger = if self.resync_marks.remove(&key).is_some() {
            SyncTrigger::Resync
        } else {
            SyncTrigger::Event
        };
        let request = SyncRequest {
            key: key.clone(),
            controller: self.ctx.name().to_string(),
            trigger,
            retries: self.queue.num_requeues(&key),
        };

        let name = self.ctx.name();
        trace!(controller = %name, worker = self.id, %key, ?trigger, "sync");
        let timer = SYNC_DURATION.with_label_values(&[name]).start_timer();
        // The call itself runs inside the guarded future so implementations
        // that panic before returning their future are caught too.
        let ctx = self.ctx.clone();
        let outcome = AssertUnwindSafe(async move { self.reconciler.reconcile(ctx, request).await })
            .catch_unwind()
            .await;
        timer.observe_duration();

        let result = outcome.unwrap_or_else(|payload| {
            SYNC_PANICS.with_label_values(&[name]).inc();
            Err(SyncError::Panicked(panic_message(payload.as_ref())).into())
        });

        match result {
            Ok(()) => {
                SYNC_TOTAL.with_label_values(&[name, "success"]).inc();
                self.queue.forget(&key);
            }
            Err(e) => {
                SYNC_TOTAL.with_label_values(&[name, "error"]).inc();
                self.report_failure(&key, e);
                self.queue.add_rate_limited(key.clone());
            }
        }

        self.queue.done(&key);
        true
    }

    fn report_failure(
        &self,
        key: &str,
        e: Error,
    ) {
        let event = match e {
            Error::Sync(SyncError::Panicked(reason)) => {
                error!(controller = %self.ctx.name(), %key, %reason, "recovered from sync panic");
                RecorderEvent::SyncPanicked {
                    key: key.to_string(),
                    reason,
                }
            }
            other => {
                warn!(controller = %self.ctx.name(), %key, error = %other, "sync failed, requeueing");
                RecorderEvent::SyncFailed {
                    key: key.to_string(),
                    reason: other.to_string(),
                }
            }
        };
        self.ctx.recorder().record(self.ctx.name(), event);
    }
}
