use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use super::ExponentialBackoff;
use super::QueueKey;
use super::RateLimiter;
use super::WorkItemState;
use crate::metrics::QUEUE_ADDS;
use crate::metrics::QUEUE_DEPTH;
use crate::metrics::QUEUE_RETRIES;
use crate::BackoffPolicy;

#[derive(Default)]
struct QueueState {
    /// Ready list, FIFO-ish
    queue: VecDeque<QueueKey>,
    /// Keys that need processing: everything on `queue` plus keys re-added
    /// while processing
    dirty: HashSet<QueueKey>,
    /// Keys currently held by a worker
    processing: HashSet<QueueKey>,
    /// Earliest pending deadline of delayed adds
    waiting: HashMap<QueueKey, Instant>,
    shutting_down: bool,
}

pub struct WorkQueue {
    name: String,
    state: Mutex<QueueState>,
    notify: Notify,
    rate_limiter: Arc<dyn RateLimiter>,
    shutdown: CancellationToken,
}

impl fmt::Debug for WorkQueue {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WorkQueue")
            .field("name", &self.name)
            .field("queued", &state.queue.len())
            .field("processing", &state.processing.len())
            .field("waiting", &state.waiting.len())
            .field("shutting_down", &state.shutting_down)
            .finish()
    }
}

impl WorkQueue {
    pub fn new(
        name: impl Into<String>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            rate_limiter,
            shutdown: CancellationToken::new(),
        }
    }

    /// Queue whose failed keys back off exponentially per `policy`.
    pub fn with_backoff(
        name: impl Into<String>,
        policy: BackoffPolicy,
    ) -> Self {
        Self::new(name, Arc::new(ExponentialBackoff::new(policy)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Marks `key` as needing processing. Never blocks on consumers.
    pub fn add(
        &self,
        key: impl Into<QueueKey>,
    ) {
        let key = key.into();
        let mut state = self.state.lock();
        if state.shutting_down {
            trace!(queue = %self.name, %key, "add ignored: shutting down");
            return;
        }
        if !state.dirty.insert(key.clone()) {
            return;
        }
        if state.processing.contains(&key) {
            trace!(queue = %self.name, %key, "marked dirty while processing");
            return;
        }

        state.queue.push_back(key);
        self.publish_depth(&state);
        QUEUE_ADDS.with_label_values(&[&self.name]).inc();
        drop(state);
        self.notify.notify_one();
    }

    /// Waits for the next key. Returns `None` once the queue is shutting down.
    ///
    /// The returned key must be handed back through [`done`](Self::done).
    pub async fn get(&self) -> Option<QueueKey> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register interest before inspecting state so a concurrent
            // `add` or `shut_down` cannot slip between the check and the wait.
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    self.publish_depth(&state);
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    /// Releases `key` after processing; requeues it if it went dirty meanwhile.
    pub fn done(
        &self,
        key: &str,
    ) {
        let mut state = self.state.lock();
        state.processing.remove(key);
        if state.shutting_down || !state.dirty.contains(key) {
            return;
        }

        state.queue.push_back(key.to_string());
        self.publish_depth(&state);
        drop(state);
        self.notify.notify_one();
    }

    /// Adds `key` once `delay` has elapsed. Pending delayed adds of the same
    /// key coalesce onto the earliest deadline and are discarded on shutdown.
    pub fn add_after(
        self: &Arc<Self>,
        key: impl Into<QueueKey>,
        delay: Duration,
    ) {
        let key = key.into();
        if delay.is_zero() {
            self.add(key);
            return;
        }

        let deadline = Instant::now() + delay;
        {
            let mut state = self.state.lock();
            if state.shutting_down {
                return;
            }
            match state.waiting.get(&key) {
                Some(existing) if *existing <= deadline => return,
                _ => {
                    state.waiting.insert(key.clone(), deadline);
                }
            }
        }

        let queue = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = sleep_until(deadline) => queue.fire_delayed(key, deadline),
            }
        });
    }

    fn fire_delayed(
        &self,
        key: QueueKey,
        deadline: Instant,
    ) {
        {
            let mut state = self.state.lock();
            // Superseded by an earlier deadline that already fired
            if state.waiting.get(&key) != Some(&deadline) {
                return;
            }
            state.waiting.remove(&key);
        }
        self.add(key);
    }

    /// Requeues `key` after the rate limiter's backoff for it. A no-op once
    /// the queue is shutting down; the failure is not counted.
    pub fn add_rate_limited(
        self: &Arc<Self>,
        key: impl Into<QueueKey>,
    ) {
        let key = key.into();
        if self.is_shutting_down() {
            debug!(queue = %self.name, %key, "shutting down, retry dropped");
            return;
        }
        let delay = self.rate_limiter.when(&key);
        debug!(queue = %self.name, %key, ?delay, "requeue with backoff");
        QUEUE_RETRIES.with_label_values(&[&self.name]).inc();
        self.add_after(key, delay);
    }

    /// Resets the backoff history of `key`.
    pub fn forget(
        &self,
        key: &str,
    ) {
        self.rate_limiter.forget(key);
    }

    pub fn num_requeues(
        &self,
        key: &str,
    ) -> u32 {
        self.rate_limiter.num_requeues(key)
    }

    /// Stops accepting keys and releases every blocked [`get`](Self::get).
    /// Keys held by workers may still be marked done.
    pub fn shut_down(&self) {
        {
            let mut state = self.state.lock();
            if state.shutting_down {
                return;
            }
            state.shutting_down = true;
            state.waiting.clear();
        }
        debug!(queue = %self.name, "work queue shutting down");
        self.shutdown.cancel();
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// Resolves once [`shut_down`](Self::shut_down) has been called.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await
    }

    /// Keys on the ready list
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    pub fn processing_len(&self) -> usize {
        self.state.lock().processing.len()
    }

    /// Nothing queued, processing or waiting out a backoff.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.queue.is_empty() && state.processing.is_empty() && state.waiting.is_empty()
    }

    pub fn state_of(
        &self,
        key: &str,
    ) -> WorkItemState {
        let state = self.state.lock();
        let dirty = state.dirty.contains(key);
        if state.processing.contains(key) {
            if dirty {
                WorkItemState::DirtyWhileProcessing
            } else {
                WorkItemState::Processing
            }
        } else if dirty {
            WorkItemState::Queued
        } else if state.waiting.contains_key(key) {
            WorkItemState::RateLimited
        } else {
            WorkItemState::Absent
        }
    }

    fn publish_depth(
        &self,
        state: &QueueState,
    ) {
        QUEUE_DEPTH
            .with_label_values(&[&self.name])
            .set(state.queue.len() as i64);
    }
}
