use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use tracing::trace;

use super::EventFilter;
use super::EventKind;
use super::KeyExtractor;
use crate::source::EventHandler;
use crate::QueueKey;
use crate::WorkQueue;

/// Keys produced by dispatchers, with the number of live objects behind each.
///
/// An add counts the object under every key it maps to, a delete releases
/// them, and an update moves the object from its old keys to its new ones.
/// A key is forgotten once no live object maps to it.
#[derive(Debug, Default)]
pub struct KnownKeys {
    keys: DashMap<QueueKey, usize>,
}

impl KnownKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn acquire(
        &self,
        key: &str,
    ) {
        *self.keys.entry(key.to_string()).or_insert(0) += 1;
    }

    pub(crate) fn release(
        &self,
        key: &str,
    ) {
        if let Entry::Occupied(mut entry) = self.keys.entry(key.to_string()) {
            if *entry.get() <= 1 {
                entry.remove();
            } else {
                *entry.get_mut() -= 1;
            }
        }
    }

    pub fn snapshot(&self) -> Vec<QueueKey> {
        self.keys.iter().map(|e| e.key().clone()).collect()
    }

    pub fn contains(
        &self,
        key: &str,
    ) -> bool {
        self.keys.contains_key(key)
    }

    /// Live objects currently mapped to `key`
    pub fn live_objects(
        &self,
        key: &str,
    ) -> usize {
        self.keys.get(key).map(|n| *n).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Everything a dispatcher needs from its controller, resolved when the
/// controller is constructed.
#[derive(Debug, Clone)]
pub struct DispatchTarget {
    pub controller: String,
    pub queue: Arc<WorkQueue>,
    /// Used by registrations without a key extractor
    pub default_key: QueueKey,
    pub known_keys: Arc<KnownKeys>,
}

/// Subscribed to a source; filters events, extracts keys and enqueues them.
pub struct Dispatcher<O> {
    target: DispatchTarget,
    filter: Option<EventFilter<O>>,
    keys: Option<KeyExtractor<O>>,
}

impl<O> Dispatcher<O> {
    pub fn new(
        target: DispatchTarget,
        filter: Option<EventFilter<O>>,
        keys: Option<KeyExtractor<O>>,
    ) -> Self {
        Self { target, filter, keys }
    }

    /// Keys of `obj`, or `None` when the filter rejects it.
    fn keys_for(
        &self,
        obj: &O,
    ) -> Option<Vec<QueueKey>> {
        if let Some(filter) = &self.filter {
            if !filter(obj) {
                return None;
            }
        }

        Some(match &self.keys {
            Some(extract) => extract(obj),
            None => vec![self.target.default_key.clone()],
        })
    }

    fn enqueue(
        &self,
        keys: Vec<QueueKey>,
        kind: EventKind,
    ) {
        if keys.is_empty() {
            trace!(controller = %self.target.controller, ?kind, "event produced no keys");
            return;
        }

        for key in keys {
            debug!(controller = %self.target.controller, ?kind, %key, "enqueue");
            self.target.queue.add(key);
        }
    }

    fn filtered(
        &self,
        kind: EventKind,
    ) {
        trace!(controller = %self.target.controller, ?kind, "event filtered out");
    }
}

impl<O> EventHandler<O> for Dispatcher<O>
where O: Send + Sync + 'static
{
    fn on_add(
        &self,
        obj: &O,
    ) {
        let Some(keys) = self.keys_for(obj) else {
            return self.filtered(EventKind::Added);
        };
        keys.iter().for_each(|k| self.target.known_keys.acquire(k));
        self.enqueue(keys, EventKind::Added);
    }

    /// Only the new state is filtered and keyed for enqueueing; the old
    /// state only releases the keys it was counted under.
    fn on_update(
        &self,
        old: &O,
        new: &O,
    ) {
        if let Some(keys) = self.keys_for(old) {
            keys.iter().for_each(|k| self.target.known_keys.release(k));
        }

        let Some(keys) = self.keys_for(new) else {
            return self.filtered(EventKind::Updated);
        };
        keys.iter().for_each(|k| self.target.known_keys.acquire(k));
        self.enqueue(keys, EventKind::Updated);
    }

    fn on_delete(
        &self,
        obj: &O,
    ) {
        let Some(keys) = self.keys_for(obj) else {
            return self.filtered(EventKind::Deleted);
        };
        keys.iter().for_each(|k| self.target.known_keys.release(k));
        self.enqueue(keys, EventKind::Deleted);
    }
}
