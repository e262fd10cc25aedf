//! One worker, resync disabled, one source keyed by object name.
//! add(A), add(B), update(A) before the worker drains must produce exactly
//! two reconciles: one for "ns/a" and one for "ns/b".

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use basecontroller::Controller;
use basecontroller::Error;
use basecontroller::SyncContext;
use basecontroller::SyncRequest;
use basecontroller::SyncTrigger;

use crate::common::keyed_registration;
use crate::common::object;
use crate::common::object_source;
use crate::common::options;
use crate::common::start;
use crate::common::wait_until;
use crate::common::Invocations;

#[tokio::test(start_paused = true)]
async fn test_burst_of_events_is_reconciled_once_per_key() -> Result<(), Error> {
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
    let mut options = options("burst", reconciler);
    options.registrations.push(keyed_registration(&source));
    let controller = Arc::new(Controller::new(options)?);

    source.apply(object("a", 1));
    source.apply(object("b", 1));
    source.apply(object("a", 2));
    source.mark_synced();

    let (cancel, handle) = start(&controller, 1);
    wait_until(|| invocations.len() >= 2).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(invocations.len(), 2);
    let keys: HashSet<_> = invocations.keys().into_iter().collect();
    assert_eq!(keys, HashSet::from(["ns/a".to_string(), "ns/b".to_string()]));
    assert!(invocations
        .requests()
        .iter()
        .all(|r| r.trigger == SyncTrigger::Event && r.controller == "burst"));

    cancel.cancel();
    handle.await.expect("controller task panicked")?;
    assert!(controller.queue().is_idle());
    Ok(())
}
