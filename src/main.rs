use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use railctl::audit::AuditLog;
use railctl::config::SchedulerConfig;
use railctl::loadgen::{self, TrafficDriver};
use railctl::server::{AppState, build_router};
use railctl::worker::SchedulerWorker;

/// How often the traffic driver proposes movements.
const TRAFFIC_TICK: std::time::Duration = std::time::Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "railctl=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SchedulerConfig::from_env();

    let log = match &config.audit_log_path {
        Some(path) => AuditLog::open(path)?,
        None => AuditLog::in_memory(),
    };
    if !log.is_empty() {
        tracing::info!(entries = log.len(), "replayed audit log");
    }

    let initial = loadgen::demo_network();
    let trains = initial.trains.keys().cloned().collect();

    let addr = config.bind_addr;
    let punctuality_threshold = config.punctuality_threshold_minutes;
    let (worker, handle) = SchedulerWorker::new(config, initial, log);

    let shutdown = CancellationToken::new();
    let worker_task = tokio::spawn(worker.run(shutdown.clone()));

    let driver = TrafficDriver::new(trains, loadgen::default_seed());
    let driver_task = tokio::spawn(driver.run(handle.clone(), TRAFFIC_TICK, shutdown.clone()));

    let app = build_router(AppState::new(handle, punctuality_threshold));

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown signal received");
                shutdown.cancel();
            }
        })
        .await?;

    shutdown.cancel();
    let _ = driver_task.await;
    let _ = worker_task.await;
    Ok(())
}
