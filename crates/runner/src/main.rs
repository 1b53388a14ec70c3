//! `certbox-runner` -- headless front-end for the certification test
//! service.
//!
//! Connects to the service bus, discovers the object tree, runs the
//! local generator batch for every enabled whitelist, and prints the
//! resulting test hierarchy. A graphical front-end drives the same
//! engine; this binary exists for scripting and smoke-testing a
//! service deployment.
//!
//! # Environment variables
//!
//! | Variable              | Required | Default | Description                                  |
//! |-----------------------|----------|---------|----------------------------------------------|
//! | `CERTBOX_BUS_WS_URL`  | yes      | --      | Signal socket, e.g. `ws://localhost:8440`    |
//! | `CERTBOX_BUS_API_URL` | yes      | --      | Call endpoint, e.g. `http://localhost:8440`  |
//! | `CERTBOX_ROOT_PATH`   | no       | `/`     | Address discovery starts from                |

use std::sync::Arc;

use certbox_bus::connector::ServiceBus;
use certbox_bus::remote::{BusConfig, RemoteServiceBus};
use certbox_core::path::ObjectPath;
use certbox_engine::engine::{RunPhase, TestEngine};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "certbox_runner=info,certbox_engine=info,certbox_bus=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ws_url = std::env::var("CERTBOX_BUS_WS_URL").unwrap_or_else(|_| {
        tracing::error!("CERTBOX_BUS_WS_URL environment variable is required");
        std::process::exit(1);
    });

    let api_url = std::env::var("CERTBOX_BUS_API_URL").unwrap_or_else(|_| {
        tracing::error!("CERTBOX_BUS_API_URL environment variable is required");
        std::process::exit(1);
    });

    let root = std::env::var("CERTBOX_ROOT_PATH")
        .map(ObjectPath::new)
        .unwrap_or_else(|_| ObjectPath::root());

    tracing::info!(ws_url = %ws_url, api_url = %api_url, "Starting certbox-runner");

    // A bus that cannot be reached at startup is fatal: the front-end
    // refuses to start rather than run against nothing.
    let bus = match RemoteServiceBus::connect(BusConfig { ws_url, api_url }).await {
        Ok(bus) => bus,
        Err(e) => {
            tracing::error!(error = %e, "Cannot connect to the test service bus");
            std::process::exit(1);
        }
    };

    let mut signals = bus.subscribe();
    let mut engine = TestEngine::with_root(Arc::clone(&bus) as Arc<dyn ServiceBus>, root);
    engine.initialise().await;

    for (path, name) in engine.whitelist_names() {
        tracing::info!(whitelist = %path, name = %name, "Whitelist enabled");
    }

    if let Err(e) = engine.run_local_jobs().await {
        tracing::error!(error = %e, "Local generator batch failed to start");
        bus.shutdown().await;
        std::process::exit(1);
    }

    // Drive the sequential run loop off the signal stream until the
    // batch completes.
    while !matches!(engine.phase(), RunPhase::Completed { .. }) {
        match signals.recv().await {
            Ok(signal) => {
                if let Err(e) = engine.on_signal(signal).await {
                    tracing::error!(error = %e, "Run loop failed");
                    bus.shutdown().await;
                    std::process::exit(1);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Signal receiver lagged");
            }
            Err(RecvError::Closed) => {
                tracing::error!("Signal stream ended before the batch completed");
                bus.shutdown().await;
                std::process::exit(1);
            }
        }
    }
    engine.acknowledge_jobs_done();

    // Print the test hierarchy the picker would show.
    let hierarchy = engine.job_hierarchy();
    for (id, depth) in hierarchy.flatten() {
        let node = hierarchy.node(id);
        let indent = "  ".repeat(depth.saturating_sub(1));
        tracing::info!("{indent}{} [{}]", node.name, node.id);
    }

    tracing::info!(
        jobs = engine.valid_run_list().len(),
        "Local batch complete; run list is ready",
    );

    bus.shutdown().await;
}
