use std::time::Duration;

use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;

use super::QueueKey;
use crate::BackoffPolicy;

/// Decides how long a failed key waits before it is retried.
#[cfg_attr(test, automock)]
pub trait RateLimiter: Send + Sync + 'static {
    /// Records one more failure of `key` and returns the delay before its retry.
    fn when(
        &self,
        key: &str,
    ) -> Duration;

    /// Clears the failure history of `key`.
    fn forget(
        &self,
        key: &str,
    );

    /// Consecutive failures recorded for `key`
    fn num_requeues(
        &self,
        key: &str,
    ) -> u32;
}

/// Per-key exponential backoff driven by a [`BackoffPolicy`].
#[derive(Debug)]
pub struct ExponentialBackoff {
    policy: BackoffPolicy,
    failures: DashMap<QueueKey, u32>,
}

impl ExponentialBackoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            failures: DashMap::new(),
        }
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }
}

impl RateLimiter for ExponentialBackoff {
    fn when(
        &self,
        key: &str,
    ) -> Duration {
        let failures = {
            let mut entry = self.failures.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(1);
            *entry
        };
        self.policy.delay_for(failures)
    }

    fn forget(
        &self,
        key: &str,
    ) {
        self.failures.remove(key);
    }

    fn num_requeues(
        &self,
        key: &str,
    ) -> u32 {
        self.failures.get(key).map(|n| *n).unwrap_or(0)
    }
}
