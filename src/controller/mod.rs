//! The controller execution core.
//!
//! ## Lifecycle
//! ```text
//! Constructed ──run──▶ WarmingUp ──ready──▶ Running ──cancel──▶ Draining ──▶ Stopped
//!                          │
//!                          └──timeout──▶ Stopped (run returns an error, may be re-run)
//! ```
//! Dispatchers are attached in [`Controller::new`], so events are queued from
//! construction onward; workers only start consuming after readiness.

mod controller;
mod options;
mod reconciler;
mod recorder;
mod resync;
mod worker;
pub use controller::*;
pub use options::*;
pub use reconciler::*;
pub use recorder::*;


use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Constructed,
    /// Waiting for every readiness predicate
    WarmingUp,
    /// Workers draining the queue, resync timer armed
    Running,
    /// Shutdown requested; in-flight reconciles finishing
    Draining,
    Stopped,
}

impl fmt::Display for ControllerPhase {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            ControllerPhase::Constructed => "constructed",
            ControllerPhase::WarmingUp => "warming-up",
            ControllerPhase::Running => "running",
            ControllerPhase::Draining => "draining",
            ControllerPhase::Stopped => "stopped",
        };
        f.write_str(s)
    }
}
