//! Periodic resync keeps reconciling known keys without event traffic and
//! stops together with the controller.

use std::sync::Arc;
use std::time::Duration;

use basecontroller::Controller;
use basecontroller::ControllerPhase;
use basecontroller::Error;
use basecontroller::ResyncPolicy;
use basecontroller::SyncContext;
use basecontroller::SyncRequest;

use crate::common::keyed_registration;
use crate::common::object;
use crate::common::object_source;
use crate::common::options;
use crate::common::start;
use crate::common::wait_until;
use crate::common::Invocations;

#[tokio::test(start_paused = true)]
async fn test_resync_reconciles_known_keys_until_cancelled() -> Result<(), Error> {
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
    let mut options = options("resync", reconciler);
    options.registrations.push(keyed_registration(&source));
    options.runtime.resync_interval_ms = 30_000;
    options.runtime.resync_policy = ResyncPolicy::AllKnownKeys;
    let controller = Arc::new(Controller::new(options)?);

    source.apply(object("a", 1));
    source.apply(object("b", 1));
    source.mark_synced();

    let (cancel, handle) = start(&controller, 2);
    wait_until(|| invocations.len() == 2).await;

    // Two resync periods
    tokio::time::sleep(Duration::from_secs(65)).await;
    let requests = invocations.requests();
    assert_eq!(requests.len(), 6);
    assert_eq!(requests.iter().filter(|r| r.is_resync()).count(), 4);

    cancel.cancel();
    handle.await.expect("controller task panicked")?;
    assert_eq!(controller.phase(), ControllerPhase::Stopped);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(invocations.len(), 6);
    Ok(())
}
