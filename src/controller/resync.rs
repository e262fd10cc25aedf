use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use tokio::time::interval_at;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dispatch::KnownKeys;
use crate::QueueKey;
use crate::Result;
use crate::ResyncPolicy;
use crate::WorkQueue;

/// Periodically enqueues keys independent of event traffic.
pub(super) struct ResyncTimer {
    pub(super) controller: Arc<str>,
    pub(super) period: Duration,
    pub(super) policy: ResyncPolicy,
    pub(super) default_key: QueueKey,
    pub(super) queue: Arc<WorkQueue>,
    pub(super) known_keys: Arc<KnownKeys>,
    /// Resync the default key when no key is known; off for keyed controllers
    pub(super) fallback_to_default: bool,
    pub(super) resync_marks: Arc<DashSet<QueueKey>>,
    pub(super) token: CancellationToken,
}

impl ResyncTimer {
    pub(super) async fn run(self) -> Result<()> {
        debug!(controller = %self.controller, period = ?self.period, policy = %self.policy, "resync armed");

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = ticker.tick() => self.fire(),
            }
        }

        debug!(controller = %self.controller, "resync stopped");
        Ok(())
    }

    fn fire(&self) {
        let keys = match self.policy {
            ResyncPolicy::DefaultKey => vec![self.default_key.clone()],
            ResyncPolicy::AllKnownKeys => {
                let known = self.known_keys.snapshot();
                if known.is_empty() && self.fallback_to_default {
                    vec![self.default_key.clone()]
                } else {
                    known
                }
            }
        };

        if keys.is_empty() {
            debug!(controller = %self.controller, "resync: no live keys");
            return;
        }

        debug!(controller = %self.controller, keys = keys.len(), "resync");
        for key in keys {
            self.resync_marks.insert(key.clone());
            self.queue.add(key);
        }
    }
}
