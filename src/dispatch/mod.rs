//! Event → queue key translation.
//!
//! A [`SourceRegistration`] groups sources of one object type with an
//! optional [`EventFilter`] and [`KeyExtractor`]. At controller construction
//! each registration is attached: a [`Dispatcher`] is subscribed to every
//! source and from then on forwards accepted events to the work queue, also
//! while the controller is still waiting for readiness.

mod dispatcher;
mod registration;
pub use dispatcher::*;
pub use registration::*;


use std::sync::Arc;

use crate::QueueKey;

/// Maps an observed object to zero or more queue keys. Must be pure.
pub type KeyExtractor<O> = Arc<dyn Fn(&O) -> Vec<QueueKey> + Send + Sync>;

/// Returns `false` to drop an event before key extraction. Must be pure.
pub type EventFilter<O> = Arc<dyn Fn(&O) -> bool + Send + Sync>;

/// `namespace/name` style key, or just `name` when the namespace is empty.
pub fn namespaced_key(
    namespace: &str,
    name: &str,
) -> QueueKey {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}/{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Updated,
    Deleted,
}
