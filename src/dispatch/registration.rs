use std::sync::Arc;

use super::DispatchTarget;
use super::Dispatcher;
use super::EventFilter;
use super::KeyExtractor;
use crate::source::EventSource;
use crate::source::HasSynced;
use crate::source::SourceSynced;
use crate::QueueKey;

/// Sources of one object type sharing a filter and a key extractor.
/// Immutable once handed to the controller.
pub struct SourceRegistration<O: 'static> {
    pub sources: Vec<Arc<dyn EventSource<O>>>,
    /// `None` accepts every event
    pub filter: Option<EventFilter<O>>,
    /// `None` maps every event to the controller's default key
    pub keys: Option<KeyExtractor<O>>,
}

impl<O: 'static> SourceRegistration<O> {
    pub fn new(sources: Vec<Arc<dyn EventSource<O>>>) -> Self {
        Self {
            sources,
            filter: None,
            keys: None,
        }
    }

    pub fn with_filter<F>(
        mut self,
        filter: F,
    ) -> Self
    where
        F: Fn(&O) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_keys<F>(
        mut self,
        keys: F,
    ) -> Self
    where
        F: Fn(&O) -> Vec<QueueKey> + Send + Sync + 'static,
    {
        self.keys = Some(Arc::new(keys));
        self
    }
}

/// Type-erased view of a [`SourceRegistration`] so a controller can hold
/// registrations over different object types.
pub trait Registration: Send + Sync + 'static {
    /// Identity of each source, used to reject duplicates
    fn source_ids(&self) -> Vec<usize>;

    /// Readiness predicate of each source, in registration order
    fn readiness(&self) -> Vec<Arc<dyn HasSynced>>;

    /// Whether events map through a key extractor rather than the default key
    fn is_keyed(&self) -> bool;

    /// Subscribes one dispatcher per source.
    fn attach(
        &self,
        target: &DispatchTarget,
    );
}

impl<O> Registration for SourceRegistration<O>
where O: Send + Sync + 'static
{
    fn source_ids(&self) -> Vec<usize> {
        self.sources.iter().map(source_id).collect()
    }

    fn readiness(&self) -> Vec<Arc<dyn HasSynced>> {
        self.sources
            .iter()
            .map(|s| Arc::new(SourceSynced(s.clone())) as Arc<dyn HasSynced>)
            .collect()
    }

    fn is_keyed(&self) -> bool {
        self.keys.is_some()
    }

    fn attach(
        &self,
        target: &DispatchTarget,
    ) {
        for source in &self.sources {
            let dispatcher = Dispatcher::new(target.clone(), self.filter.clone(), self.keys.clone());
            source.subscribe(Arc::new(dispatcher));
        }
    }
}

/// Address of the object behind an `Arc`, ignoring any vtable.
pub(crate) fn source_id<T: ?Sized>(source: &Arc<T>) -> usize {
    Arc::as_ptr(source) as *const () as usize
}
