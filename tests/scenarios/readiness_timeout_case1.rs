//! A readiness predicate that never turns true with a one second cache sync
//! timeout: `run` fails after about a second and nothing is reconciled.

use std::sync::Arc;
use std::time::Duration;

use basecontroller::Controller;
use basecontroller::ControllerError;
use basecontroller::ControllerPhase;
use basecontroller::Error;
use basecontroller::HasSynced;
use basecontroller::SyncContext;
use basecontroller::SyncRequest;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::common::keyed_registration;
use crate::common::object;
use crate::common::object_source;
use crate::common::options;
use crate::common::Invocations;

struct NeverSynced;

impl HasSynced for NeverSynced {
    fn has_synced(&self) -> bool {
        false
    }
}

#[tokio::test(start_paused = true)]
async fn test_run_fails_when_caches_never_sync() -> Result<(), Error> {
    crate::enable_logger();

    let invocations = Invocations::default();
    let sink = invocations.clone();
    let reconciler = Arc::new(move |_ctx: SyncContext, req: SyncRequest| {
        let sink = sink.clone();
        async move {
            sink.push(req);
            Ok::<(), Error>(())
        }
    });

    let source = object_source();
    source.mark_synced();
    let mut options = options("never-ready", reconciler);
    options.registrations.push(keyed_registration(&source));
    options.bare_sources.push(Arc::new(NeverSynced));
    options.runtime.cache_sync_timeout_ms = 1000;
    let controller = Controller::new(options)?;

    // Queued during warm-up, never consumed
    source.apply(object("a", 1));

    let started = Instant::now();
    let result = controller.run(2, CancellationToken::new()).await;
    let elapsed = started.elapsed();

    match result {
        Err(Error::Controller(ControllerError::CacheSyncTimeout { controller, timeout })) => {
            assert_eq!(controller, "never-ready");
            assert_eq!(timeout, Duration::from_secs(1));
        }
        other => panic!("expected a cache sync timeout, got {other:?}"),
    }
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_millis(1500));
    assert_eq!(invocations.len(), 0);
    assert_eq!(controller.phase(), ControllerPhase::Stopped);
    assert_eq!(controller.queue().len(), 1);
    Ok(())
}
