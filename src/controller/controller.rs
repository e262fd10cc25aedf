use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashSet;
use futures::future::join_all;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::resync::ResyncTimer;
use super::worker::Worker;
use super::ControllerOptions;
use super::ControllerPhase;
use super::Reconciler;
use super::Recorder;
use super::RecorderEvent;
use super::SyncContext;
use super::TracingRecorder;
use crate::dispatch::source_id;
use crate::dispatch::DispatchTarget;
use crate::dispatch::KnownKeys;
use crate::metrics;
use crate::readiness::Readiness;
use crate::readiness::ReadinessGate;
use crate::utils::spawn_task;
use crate::ControllerError;
use crate::ExponentialBackoff;
use crate::QueueKey;
use crate::Result;
use crate::RuntimeConfig;
use crate::WorkQueue;

/// Drives a [`Reconciler`] to convergence for every key its sources produce.
pub struct Controller {
    name: Arc<str>,
    reconciler: Arc<dyn Reconciler>,
    recorder: Arc<dyn Recorder>,
    queue: Arc<WorkQueue>,
    gate: ReadinessGate,
    runtime: RuntimeConfig,
    known_keys: Arc<KnownKeys>,
    /// Any registration maps events through a key extractor
    keyed: bool,
    resync_marks: Arc<DashSet<QueueKey>>,
    phase: watch::Sender<ControllerPhase>,
}

impl fmt::Debug for Controller {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Controller")
            .field("name", &self.name)
            .field("phase", &*self.phase.borrow())
            .field("queue", &self.queue)
            .field("gate", &self.gate)
            .finish()
    }
}

impl Controller {
    /// Validates `options` and subscribes a dispatcher to every registered
    /// source. Events are queued from here on, before [`run`](Self::run).
    ///
    /// # Errors
    /// [`ControllerError`] for a missing reconciler, an empty name or a
    /// source registered twice; [`ConfigError`](config::ConfigError) for
    /// invalid runtime or backoff settings.
    pub fn new(options: ControllerOptions) -> Result<Self> {
        let ControllerOptions {
            name,
            reconciler,
            registrations,
            bare_sources,
            runtime,
            backoff,
            rate_limiter,
            recorder,
        } = options;

        if name.is_empty() {
            return Err(ControllerError::EmptyName.into());
        }
        let reconciler = reconciler.ok_or_else(|| ControllerError::MissingReconciler(name.clone()))?;
        runtime.validate()?;
        backoff.validate()?;

        let mut seen = HashSet::new();
        let ids = registrations
            .iter()
            .flat_map(|r| r.source_ids())
            .chain(bare_sources.iter().map(source_id));
        for (index, id) in ids.enumerate() {
            if !seen.insert(id) {
                return Err(ControllerError::DuplicateSource {
                    controller: name.clone(),
                    index,
                }
                .into());
            }
        }

        let rate_limiter = rate_limiter.unwrap_or_else(|| Arc::new(ExponentialBackoff::new(backoff)));
        let queue = Arc::new(WorkQueue::new(name.clone(), rate_limiter));
        let recorder = recorder.unwrap_or_else(|| Arc::new(TracingRecorder));
        let known_keys = Arc::new(KnownKeys::new());

        let target = DispatchTarget {
            controller: name.clone(),
            queue: queue.clone(),
            default_key: runtime.default_queue_key.clone(),
            known_keys: known_keys.clone(),
        };

        // Keyed registrations first, then default-keyed ones, then bare sources
        let (keyed, unkeyed): (Vec<_>, Vec<_>) = registrations.iter().partition(|r| r.is_keyed());
        let has_keyed = !keyed.is_empty();
        let mut checks = Vec::new();
        for registration in keyed.into_iter().chain(unkeyed) {
            registration.attach(&target);
            checks.extend(registration.readiness());
        }
        checks.extend(bare_sources);

        metrics::init_metrics();

        info!(
            controller = %name,
            registrations = registrations.len(),
            readiness_checks = checks.len(),
            resync = ?runtime.resync_interval(),
            resync_policy = %runtime.resync_policy,
            "controller constructed"
        );

        let (phase, _) = watch::channel(ControllerPhase::Constructed);
        Ok(Self {
            gate: ReadinessGate::new(name.clone(), checks),
            name: name.into(),
            reconciler,
            recorder,
            queue,
            runtime,
            known_keys,
            keyed: has_keyed,
            resync_marks: Arc::new(DashSet::new()),
            phase,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Keys that at least one live object currently maps to
    pub fn known_keys(&self) -> &Arc<KnownKeys> {
        &self.known_keys
    }

    pub fn phase(&self) -> ControllerPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<ControllerPhase> {
        self.phase.subscribe()
    }

    /// Waits for readiness, then runs `workers` reconcile loops until
    /// `cancel` fires or the queue is shut down, and drains them.
    ///
    /// Cancelling during warm-up stops the controller and returns `Ok`.
    ///
    /// # Errors
    /// - [`ControllerError::InvalidWorkerCount`] for zero workers
    /// - [`ControllerError::CacheSyncTimeout`] when readiness is not reached in
    ///   time; no reconcile has run and `run` may be called again
    /// - [`ControllerError::AlreadyRunning`] / [`ControllerError::ShutDown`]
    ///   when the controller is not in a runnable phase
    pub async fn run(
        &self,
        workers: usize,
        cancel: CancellationToken,
    ) -> Result<()> {
        if workers == 0 {
            return Err(ControllerError::InvalidWorkerCount(workers).into());
        }
        self.enter_warm_up()?;

        let readiness = self.gate.wait_for_ready(
            self.runtime.cache_sync_timeout(),
            self.runtime.cache_sync_poll_interval(),
            &cancel,
        );
        match readiness.await {
            Ok(Readiness::Ready) => {}
            Ok(Readiness::Cancelled) => {
                info!(controller = %self.name, "cancelled before caches synced");
                self.queue.shut_down();
                self.set_phase(ControllerPhase::Stopped);
                return Ok(());
            }
            Err(e) => {
                self.recorder.record(
                    &self.name,
                    RecorderEvent::CacheSyncTimeout {
                        timeout: self.runtime.cache_sync_timeout(),
                    },
                );
                self.set_phase(ControllerPhase::Stopped);
                return Err(e);
            }
        }

        let token = cancel.child_token();
        let ctx = SyncContext::new(self.name.clone(), self.queue.clone(), self.recorder.clone(), token.clone());

        let mut handles = Vec::with_capacity(workers + 1);
        for id in 0..workers {
            let worker = Worker {
                id,
                ctx: ctx.clone(),
                reconciler: self.reconciler.clone(),
                queue: self.queue.clone(),
                resync_marks: self.resync_marks.clone(),
            };
            spawn_task(&format!("{}-worker-{id}", self.name), move || worker.run(), Some(&mut handles));
        }

        if let Some(period) = self.runtime.resync_interval() {
            let timer = ResyncTimer {
                controller: self.name.clone(),
                period,
                policy: self.runtime.resync_policy,
                default_key: self.runtime.default_queue_key.clone(),
                queue: self.queue.clone(),
                known_keys: self.known_keys.clone(),
                fallback_to_default: !self.keyed,
                resync_marks: self.resync_marks.clone(),
                token: token.clone(),
            };
            spawn_task(&format!("{}-resync", self.name), move || timer.run(), Some(&mut handles));
        }

        self.set_phase(ControllerPhase::Running);
        info!(controller = %self.name, workers, "controller running");

        tokio::select! {
            _ = cancel.cancelled() => debug!(controller = %self.name, "cancellation received"),
            _ = self.queue.closed() => debug!(controller = %self.name, "work queue shut down"),
        }

        self.set_phase(ControllerPhase::Draining);
        info!(controller = %self.name, in_flight = self.queue.processing_len(), "draining workers");
        self.queue.shut_down();
        token.cancel();

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!(controller = %self.name, "controller task failed: {:?}", e);
            }
        }

        self.set_phase(ControllerPhase::Stopped);
        info!(controller = %self.name, "controller stopped");
        Ok(())
    }

    /// Constructed, or Stopped after a readiness timeout, may start warming up.
    fn enter_warm_up(&self) -> Result<()> {
        let mut outcome = Ok(());
        self.phase.send_if_modified(|phase| match *phase {
            ControllerPhase::Constructed => {
                *phase = ControllerPhase::WarmingUp;
                true
            }
            ControllerPhase::Stopped if !self.queue.is_shutting_down() => {
                *phase = ControllerPhase::WarmingUp;
                true
            }
            ControllerPhase::Stopped => {
                outcome = Err(ControllerError::ShutDown(self.name.to_string()).into());
                false
            }
            _ => {
                outcome = Err(ControllerError::AlreadyRunning(self.name.to_string()).into());
                false
            }
        });
        if outcome.is_ok() {
            info!(controller = %self.name, phase = %ControllerPhase::WarmingUp, "phase changed");
        } else {
            warn!(controller = %self.name, phase = %self.phase(), "run rejected");
        }
        outcome
    }

    fn set_phase(
        &self,
        next: ControllerPhase,
    ) {
        let prev = self.phase.send_replace(next);
        if prev != next {
            info!(controller = %self.name, from = %prev, to = %next, "phase changed");
        }
    }
}
