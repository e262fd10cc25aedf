//! Several producers hammer a handful of keys while four workers drain the
//! queue on a multi-threaded runtime. No key is ever reconciled by two
//! workers at once and every key converges on its last revision.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use basecontroller::Controller;
use basecontroller::Error;
use basecontroller::MemorySource;
use basecontroller::SyncContext;
use basecontroller::SyncRequest;
use parking_lot::Mutex;

use crate::common::keyed_registration;
use crate::common::object_source;
use crate::common::options;
use crate::common::start;
use crate::common::wait_until;
use crate::common::Object;

const NAMES: [&str; 5] = ["a", "b", "c", "d", "e"];
const REVISIONS: u32 = 200;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_keys_are_never_processed_concurrently() -> Result<(), Error> {
    crate::enable_logger();

    let source = object_source();
    let in_flight: Arc<Mutex<HashSet<String>>> = Arc::default();
    let overlaps = Arc::new(Mutex::new(0u32));
    let observed: Arc<Mutex<HashMap<String, u32>>> = Arc::default();

    let cache = source.clone();
    let (active, overlap, seen) = (in_flight.clone(), overlaps.clone(), observed.clone());
    let reconciler = Arc::new(move |_ctx: SyncContext, req: SyncRequest| {
        let (cache, active, overlap, seen) = (cache.clone(), active.clone(), overlap.clone(), seen.clone());
        async move {
            if !active.lock().insert(req.key.clone()) {
                *overlap.lock() += 1;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
            let name = req.key.trim_start_matches("ns/");
            if let Some(o) = cache.get(name) {
                seen.lock().insert(req.key.clone(), o.revision);
            }
            active.lock().remove(&req.key);
            Ok::<(), Error>(())
        }
    });

    let mut options = options("concurrent", reconciler);
    options.registrations.push(keyed_registration(&source));
    let controller = Arc::new(Controller::new(options)?);
    source.mark_synced();

    let (cancel, handle) = start(&controller, 4);

    let producers: Vec<_> = NAMES
        .iter()
        .map(|&name| {
            let source: Arc<MemorySource<Object>> = source.clone();
            tokio::spawn(async move {
                for revision in 1..=REVISIONS {
                    source.apply(Object { name, revision });
                    if revision % 20 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        })
        .collect();
    for producer in futures::future::join_all(producers).await {
        producer.expect("producer panicked");
    }

    wait_until(|| {
        let seen = observed.lock();
        NAMES
            .iter()
            .all(|n| seen.get(&format!("ns/{n}")) == Some(&REVISIONS))
    })
    .await;

    cancel.cancel();
    handle.await.expect("controller task panicked")?;

    assert_eq!(*overlaps.lock(), 0);
    assert!(in_flight.lock().is_empty());
    Ok(())
}
