//! The reconciler fails the first attempt for "k" and succeeds the second.
//! Exactly two attempts happen, at least the base backoff apart, and the
//! queue is empty afterwards.

use std::sync::Arc;
use std::time::Duration;

use basecontroller::BackoffPolicy;
use basecontroller::Controller;
use basecontroller::Error;
use basecontroller::InMemoryRecorder;
use basecontroller::RecorderEvent;
use basecontroller::SyncContext;
use basecontroller::SyncError;
use basecontroller::SyncRequest;

use crate::common::options;
use crate::common::start;
use crate::common::wait_until;
use crate::common::Invocations;

const BASE_DELAY_MS: u64 = 250;

#[tokio::test(start_paused = true)]
async fn test_failed_key_is_retried_once_after_base_delay() -> Result<(), Error> {
    crate::enable_logger();

    let invocations = Invocations::default();
    let sink = invocations.clone();
    let reconciler = Arc::new(move |_ctx: SyncContext, req: SyncRequest| {
        let sink = sink.clone();
        async move {
            let first = req.retries == 0;
            sink.push(req);
            if first {
                return Err(SyncError::failed("dependency not ready").into());
            }
            Ok::<(), Error>(())
        }
    });

    let recorder = Arc::new(InMemoryRecorder::new());
    let mut options = options("retry", reconciler);
    options.backoff = BackoffPolicy {
        base_delay_ms: BASE_DELAY_MS,
        max_delay_ms: 10 * BASE_DELAY_MS,
    };
    options.recorder = Some(recorder.clone());
    let controller = Arc::new(Controller::new(options)?);
    controller.queue().add("k");

    let (cancel, handle) = start(&controller, 1);
    wait_until(|| invocations.len() == 2).await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(invocations.len(), 2);
    assert_eq!(invocations.keys(), vec!["k".to_string(), "k".to_string()]);
    let times = invocations.times();
    assert!(times[1] - times[0] >= Duration::from_millis(BASE_DELAY_MS));
    assert!(controller.queue().is_idle());
    assert_eq!(controller.queue().num_requeues("k"), 0);

    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0].1, RecorderEvent::SyncFailed { key, .. } if key == "k"));

    cancel.cancel();
    handle.await.expect("controller task panicked")?;
    Ok(())
}
