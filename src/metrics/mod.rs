//! Prometheus instrumentation for controllers. Every series carries the
//! controller name as its `controller` label.


use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use tracing::warn;

lazy_static! {
    pub static ref SYNC_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("controller_sync_total", "Reconcile invocations by outcome"),
        &["controller", "result"]
    )
    .expect("metric can not be created");

    pub static ref SYNC_PANICS: IntCounterVec = IntCounterVec::new(
        Opts::new("controller_sync_panics_total", "Reconcile invocations that panicked"),
        &["controller"]
    )
    .expect("metric can not be created");

    pub static ref SYNC_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("controller_sync_duration_seconds", "Reconcile latency in seconds")
            .buckets(exponential_buckets(0.001, 2.0, 16).expect("valid buckets")),
        &["controller"]
    )
    .expect("metric can not be created");

    pub static ref QUEUE_ADDS: IntCounterVec = IntCounterVec::new(
        Opts::new("controller_queue_adds_total", "Keys newly placed on the ready list"),
        &["controller"]
    )
    .expect("metric can not be created");

    pub static ref QUEUE_RETRIES: IntCounterVec = IntCounterVec::new(
        Opts::new("controller_queue_retries_total", "Keys requeued with backoff"),
        &["controller"]
    )
    .expect("metric can not be created");

    pub static ref QUEUE_DEPTH: IntGaugeVec = IntGaugeVec::new(
        Opts::new("controller_queue_depth", "Keys waiting on the ready list"),
        &["controller"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

pub(crate) fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(SYNC_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(SYNC_PANICS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(SYNC_DURATION.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(QUEUE_ADDS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(QUEUE_RETRIES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(QUEUE_DEPTH.clone()))
        .expect("collector can be registered");
}

/// Registers the controller collectors with [`REGISTRY`]; idempotent.
pub fn init_metrics() {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));
}

/// Renders [`REGISTRY`] in the Prometheus text exposition format.
pub fn gather_text() -> String {
    init_metrics();

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("could not encode controller metrics: {}", e);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        warn!("controller metrics could not be from_utf8'd: {}", e);
        String::new()
    })
}
