//! Deduplicating, rate-limited work queue shared by every producer
//! (dispatchers, resync timer, reconcilers) and the worker pool.
//!
//! ## Guarantees
//! - A key is never handed to two workers at once.
//! - Adding a key that is already queued is a no-op; adding a key that is
//!   being processed marks it dirty, and it is queued again by [`WorkQueue::done`].
//! - Failed keys come back after a per-key exponential backoff
//!   ([`WorkQueue::add_rate_limited`]) until [`WorkQueue::forget`] resets them.
//! - After [`WorkQueue::shut_down`] nothing new is accepted and every pending
//!   or future [`WorkQueue::get`] returns `None`.

mod rate_limiter;
mod work_queue;
pub use rate_limiter::*;
pub use work_queue::*;


/// Opaque identifier of a unit of reconciliation work, unique per queue.
pub type QueueKey = String;

/// Where a key currently sits inside a [`WorkQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItemState {
    Absent,
    /// Waiting in the ready list
    Queued,
    /// Handed to a worker, not yet marked done
    Processing,
    /// Re-added while processing; queued again once marked done
    DirtyWhileProcessing,
    /// Waiting out a backoff delay before becoming queued
    RateLimited,
}
