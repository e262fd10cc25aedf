//! Change-notification capabilities consumed by the controller.
//!
//! The controller never implements a watch mechanism itself. Anything able to
//! accept an [`EventHandler`] and report whether its local cache holds a
//! complete initial snapshot can drive it.

mod memory;
pub use memory::*;


use std::sync::Arc;

/// Reports whether a source's local cache is populated.
pub trait HasSynced: Send + Sync + 'static {
    fn has_synced(&self) -> bool;
}

/// Receives add/update/delete notifications for objects of type `O`.
///
/// Implementations are invoked on whatever task or thread the source uses
/// and must not block.
pub trait EventHandler<O>: Send + Sync + 'static {
    fn on_add(
        &self,
        obj: &O,
    );

    fn on_update(
        &self,
        old: &O,
        new: &O,
    );

    /// `obj` is the final state known to the source
    fn on_delete(
        &self,
        obj: &O,
    );
}

/// A cache of `O` objects emitting change notifications.
pub trait EventSource<O>: HasSynced {
    fn subscribe(
        &self,
        handler: Arc<dyn EventHandler<O>>,
    );
}

/// Readiness view of a typed event source.
pub(crate) struct SourceSynced<O: 'static>(pub(crate) Arc<dyn EventSource<O>>);

impl<O: 'static> HasSynced for SourceSynced<O> {
    fn has_synced(&self) -> bool {
        self.0.has_synced()
    }
}
