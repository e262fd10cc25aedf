use std::sync::Arc;
use std::time::Duration;

use basecontroller::namespaced_key;
use basecontroller::Controller;
use basecontroller::ControllerOptions;
use basecontroller::EventSource;
use basecontroller::MemorySource;
use basecontroller::QueueKey;
use basecontroller::Reconciler;
use basecontroller::Result;
use basecontroller::SourceRegistration;
use basecontroller::SyncRequest;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct Object {
    pub name: &'static str,
    pub revision: u32,
}

pub fn object(
    name: &'static str,
    revision: u32,
) -> Object {
    Object { name, revision }
}

pub fn object_source() -> Arc<MemorySource<Object>> {
    Arc::new(MemorySource::new(|o: &Object| o.name.to_string()))
}

pub fn object_keys(o: &Object) -> Vec<QueueKey> {
    vec![namespaced_key("ns", o.name)]
}

pub fn keyed_registration(source: &Arc<MemorySource<Object>>) -> Box<SourceRegistration<Object>> {
    let source: Arc<dyn EventSource<Object>> = source.clone();
    Box::new(SourceRegistration::new(vec![source]).with_keys(object_keys))
}

/// Every invocation the reconciler saw, with the (paused) time it happened.
#[derive(Clone, Default)]
pub struct Invocations(Arc<Mutex<Vec<(SyncRequest, Instant)>>>);

impl Invocations {
    pub fn push(
        &self,
        request: SyncRequest,
    ) {
        self.0.lock().push((request, Instant::now()));
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn keys(&self) -> Vec<QueueKey> {
        self.0.lock().iter().map(|(r, _)| r.key.clone()).collect()
    }

    pub fn times(&self) -> Vec<Instant> {
        self.0.lock().iter().map(|(_, t)| *t).collect()
    }

    pub fn requests(&self) -> Vec<SyncRequest> {
        self.0.lock().iter().map(|(r, _)| r.clone()).collect()
    }
}

pub fn options(
    name: &str,
    reconciler: Arc<dyn Reconciler>,
) -> ControllerOptions {
    let mut options = ControllerOptions::new(name);
    options.reconciler = Some(reconciler);
    options
}

pub fn start(
    controller: &Arc<Controller>,
    workers: usize,
) -> (CancellationToken, JoinHandle<Result<()>>) {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let controller = controller.clone();
    (cancel, tokio::spawn(async move { controller.run(workers, token).await }))
}

pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = Instant::now() + Duration::from_secs(60);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        sleep(Duration::from_millis(5)).await;
    }
}
