//! Startup gate over every registered source's readiness predicate.
//!
//! Workers only start draining the queue once [`ReadinessGate::wait_for_ready`]
//! succeeds. Dispatchers are already attached at that point, so events seen
//! during warm-up are queued and processed afterwards.


use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::source::HasSynced;
use crate::ControllerError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Every predicate reported true
    Ready,
    /// The cancellation token fired before the predicates turned true
    Cancelled,
}

pub struct ReadinessGate {
    controller: String,
    checks: Vec<Arc<dyn HasSynced>>,
}

impl fmt::Debug for ReadinessGate {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("controller", &self.controller)
            .field("checks", &self.checks.len())
            .finish()
    }
}

impl ReadinessGate {
    pub fn new(
        controller: impl Into<String>,
        checks: Vec<Arc<dyn HasSynced>>,
    ) -> Self {
        Self {
            controller: controller.into(),
            checks,
        }
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        self.checks.iter().all(|c| c.has_synced())
    }

    /// Positions of the predicates still reporting false
    pub fn pending(&self) -> Vec<usize> {
        self.checks
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.has_synced())
            .map(|(i, _)| i)
            .collect()
    }

    /// Polls every `poll_interval` until all predicates are true.
    ///
    /// # Errors
    /// [`ControllerError::CacheSyncTimeout`] once `timeout` elapses. The
    /// timeout is not retried here; the caller decides.
    pub async fn wait_for_ready(
        &self,
        timeout: Duration,
        poll_interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<Readiness> {
        info!(controller = %self.controller, checks = self.checks.len(), "waiting for caches to sync");

        let deadline = Instant::now() + timeout;
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(controller = %self.controller, "cache sync wait cancelled");
                    return Ok(Readiness::Cancelled);
                }
                _ = sleep_until(deadline) => {
                    error!(
                        controller = %self.controller,
                        pending = ?self.pending(),
                        ?timeout,
                        "caches did not sync in time"
                    );
                    return Err(ControllerError::CacheSyncTimeout {
                        controller: self.controller.clone(),
                        timeout,
                    }
                    .into());
                }
                _ = ticker.tick() => {
                    if self.is_ready() {
                        info!(controller = %self.controller, "caches are synced");
                        return Ok(Readiness::Ready);
                    }
                }
            }
        }
    }
}
