use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::EventHandler;
use super::EventSource;
use super::HasSynced;

type IdentityFn<O> = Arc<dyn Fn(&O) -> String + Send + Sync>;

/// In-process object cache that behaves like a shared informer.
///
/// Objects are identified by `identity(obj)`. `apply` emits an add or an
/// update depending on whether the identity is already cached, `remove`
/// emits a delete carrying the last cached state. Handlers subscribed after
/// objects were cached receive an add for each of them, so late subscribers
/// still observe the full snapshot.
pub struct MemorySource<O> {
    identity: IdentityFn<O>,
    objects: RwLock<HashMap<String, O>>,
    handlers: RwLock<Vec<Arc<dyn EventHandler<O>>>>,
    synced: AtomicBool,
}

impl<O> fmt::Debug for MemorySource<O> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("MemorySource")
            .field("objects", &self.objects.read().len())
            .field("handlers", &self.handlers.read().len())
            .field("synced", &self.synced.load(Ordering::Acquire))
            .finish()
    }
}

impl<O> MemorySource<O>
where O: Clone + Send + Sync + 'static
{
    pub fn new<F>(identity: F) -> Self
    where F: Fn(&O) -> String + Send + Sync + 'static {
        Self {
            identity: Arc::new(identity),
            objects: RwLock::new(HashMap::new()),
            handlers: RwLock::new(Vec::new()),
            synced: AtomicBool::new(false),
        }
    }

    /// Inserts or replaces `obj`, notifying every handler.
    pub fn apply(
        &self,
        obj: O,
    ) {
        let id = (self.identity)(&obj);
        let previous = self.objects.write().insert(id.clone(), obj.clone());

        let handlers = self.handlers();
        match previous {
            Some(old) => {
                trace!(%id, "memory source: update");
                handlers.iter().for_each(|h| h.on_update(&old, &obj));
            }
            None => {
                trace!(%id, "memory source: add");
                handlers.iter().for_each(|h| h.on_add(&obj));
            }
        }
    }

    /// Removes the object with identity `id`; returns its last cached state.
    pub fn remove(
        &self,
        id: &str,
    ) -> Option<O> {
        let removed = self.objects.write().remove(id)?;
        trace!(%id, "memory source: delete");
        self.handlers().iter().for_each(|h| h.on_delete(&removed));
        Some(removed)
    }

    pub fn get(
        &self,
        id: &str,
    ) -> Option<O> {
        self.objects.read().get(id).cloned()
    }

    pub fn list(&self) -> Vec<O> {
        self.objects.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Marks the initial snapshot as complete.
    pub fn mark_synced(&self) {
        self.synced.store(true, Ordering::Release);
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    // Handlers are cloned out so callbacks never run under the lock.
    fn handlers(&self) -> Vec<Arc<dyn EventHandler<O>>> {
        self.handlers.read().clone()
    }
}

impl<O> HasSynced for MemorySource<O>
where O: Send + Sync + 'static
{
    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }
}

impl<O> EventSource<O> for MemorySource<O>
where O: Clone + Send + Sync + 'static
{
    fn subscribe(
        &self,
        handler: Arc<dyn EventHandler<O>>,
    ) {
        // Holding the handler list while snapshotting means a concurrent
        // `apply` is either in the snapshot or notifies the new handler.
        let snapshot = {
            let mut handlers = self.handlers.write();
            let snapshot = self.list();
            handlers.push(handler.clone());
            snapshot
        };
        snapshot.iter().for_each(|obj| handler.on_add(obj));
    }
}
