//! Demo controller over an in-memory source.
//!
//! Simulates a stream of object changes and reconciles them until SIGINT or
//! SIGTERM. Settings come from `CONFIG_PATH` and `CONTROLLER__*` variables,
//! log filtering from `RUST_LOG`.

use std::sync::Arc;
use std::time::Duration;

use basecontroller::gather_text;
use basecontroller::namespaced_key;
use basecontroller::Controller;
use basecontroller::ControllerOptions;
use basecontroller::ControllerSettings;
use basecontroller::EventSource;
use basecontroller::MemorySource;
use basecontroller::Result;
use basecontroller::SourceRegistration;
use basecontroller::SyncContext;
use basecontroller::SyncError;
use basecontroller::SyncRequest;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[derive(Debug, Clone)]
struct Widget {
    namespace: String,
    name: String,
    replicas: u32,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    init_observability();

    let settings = ControllerSettings::new()?.validate()?;
    info!("{:?}", settings);

    let widgets: Arc<MemorySource<Widget>> =
        Arc::new(MemorySource::new(|w: &Widget| namespaced_key(&w.namespace, &w.name)));

    let mut options = ControllerOptions::from_settings("widgets", &settings);
    let cache = widgets.clone();
    options.reconciler = Some(Arc::new(move |_ctx: SyncContext, req: SyncRequest| {
        let cache = cache.clone();
        async move { reconcile(&cache, req) }
    }));
    let source: Arc<dyn EventSource<Widget>> = widgets.clone();
    options.registrations.push(Box::new(
        SourceRegistration::new(vec![source])
            .with_filter(|w: &Widget| !w.namespace.starts_with("kube-"))
            .with_keys(|w: &Widget| vec![namespaced_key(&w.namespace, &w.name)]),
    ));

    let controller = Controller::new(options)?;

    let cancel = CancellationToken::new();
    tokio::spawn(graceful_shutdown(cancel.clone()));
    tokio::spawn(simulate_changes(widgets, cancel.clone()));

    info!("Application started. Waiting for CTRL+C signal...");
    if let Err(e) = controller.run(settings.runtime.workers, cancel).await {
        error!("controller stops: {:?}", e);
        return Err(e);
    }

    debug!("{}", gather_text());
    info!("Exiting program.");
    Ok(())
}

fn reconcile(
    cache: &MemorySource<Widget>,
    req: SyncRequest,
) -> Result<()> {
    match cache.get(&req.key) {
        Some(widget) if widget.replicas > 5 => Err(SyncError::failed(format!(
            "{} wants {} replicas, capacity is 5",
            req.key, widget.replicas
        ))
        .into()),
        Some(widget) => {
            info!(key = %req.key, replicas = widget.replicas, trigger = ?req.trigger, "widget converged");
            Ok(())
        }
        None => {
            info!(key = %req.key, trigger = ?req.trigger, "widget gone, cleaning up");
            Ok(())
        }
    }
}

async fn simulate_changes(
    widgets: Arc<MemorySource<Widget>>,
    cancel: CancellationToken,
) {
    for i in 0..3 {
        widgets.apply(Widget {
            namespace: "default".to_string(),
            name: format!("widget-{i}"),
            replicas: 1,
        });
    }
    widgets.mark_synced();

    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    let mut round: u32 = 0;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        round += 1;
        let name = format!("widget-{}", round % 4);
        if round % 7 == 0 {
            widgets.remove(&namespaced_key("default", &name));
        } else {
            widgets.apply(Widget {
                namespace: "default".to_string(),
                name,
                replicas: round % 8,
            });
        }
    }
}

async fn graceful_shutdown(cancel: CancellationToken) {
    let (mut sigint, mut sigterm) =
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {:?}", e);
                cancel.cancel();
                return;
            }
        };

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
    }

    info!("Shutdown controller..");
    cancel.cancel();
}

fn init_observability() {
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    tracing_subscriber::registry().with(base_subscriber).init();
}
