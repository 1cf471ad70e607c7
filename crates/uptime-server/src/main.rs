//! Uptime server binary

use std::sync::Arc;
use tokio::sync::Notify;
use uptime::MemoryStore;
use uptime_server::{Collaborators, Config, MetricsServer, ServerCoordinator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging is not up yet, report config problems on stderr
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("Using default configuration");
            Config::default()
        }
    };

    let level = config.logging.level.as_deref().unwrap_or("info");
    match config.logging.format.as_deref() {
        Some("json") => common::logging::init_json(level),
        _ => common::logging::init(level),
    }

    tracing::info!("Uptime server starting");

    if let Err(e) = config.verify_assets() {
        if config.server.development {
            tracing::warn!(error = %e, "UI assets missing, continuing in development mode");
        } else {
            tracing::error!(error = %e, "UI assets missing, build the frontend before starting");
            std::process::exit(1);
        }
    }

    let server_config = config.to_server_config();
    let store = Arc::new(MemoryStore::new());
    let coordinator = ServerCoordinator::get_instance(server_config, Collaborators::in_memory(store));

    let report = coordinator.init_after_database_ready().await?;
    tracing::info!(
        timezone = report.timezone.as_ref().map(|tz| tz.name.as_str()),
        due = report.first_pass.due,
        rolled = report.first_pass.rolled,
        "Startup complete"
    );

    let shutdown = Arc::new(Notify::new());
    let metrics_task = coordinator.metrics().cloned().map(|registry| {
        let server = MetricsServer::new(registry, coordinator.config().metrics_listen_addr.clone());
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = server.run_until(async move { shutdown.notified().await }).await {
                tracing::error!(error = %e, "Metrics server failed");
            }
        })
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    coordinator.stop().await;
    shutdown.notify_one();
    if let Some(task) = metrics_task {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Metrics server task failed");
        }
    }

    tracing::info!("Uptime server stopped");
    Ok(())
}
