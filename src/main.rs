// SPDX-License-Identifier: GPL-3.0-only
mod api;
mod config;
mod connectivity;
mod logging;
mod push;
mod queue;
mod replay;
mod sync;
mod utils;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use api::{ApiHandlers, EventHub, HttpServer};
use config::Config;
use connectivity::{ConnectivityMonitor, HttpProbe};
use logging::setup_logging;
use push::PushHandler;
use queue::{OfflineQueue, RetryPolicy, SqliteQueueStore, SyncResult};
use replay::HttpReplayer;
use sync::{BackgroundSync, SyncCoordinator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    setup_logging(&config.log_level, config.log_json)?;

    info!("Starting medsync-agent v{}", env!("CARGO_PKG_VERSION"));

    let backend = utils::parse_http_url(&config.backend_api_url)?;
    let app_origin = utils::parse_http_url(&config.app_origin)?;

    // Initialize the offline queue
    let store = Arc::new(SqliteQueueStore::new(&config.queue_db_path).await?);
    info!("Offline queue opened at {}", config.queue_db_path.display());

    let replayer = Arc::new(HttpReplayer::new(config.request_timeout())?);
    let background = Arc::new(BackgroundSync::new(config.background_sync_enabled));
    let policy = RetryPolicy {
        max_attempts: config.max_replay_attempts,
        ttl: Duration::from_secs(config.action_ttl_secs),
    };
    let queue = Arc::new(OfflineQueue::new(
        store,
        replayer,
        Arc::clone(&background),
        backend,
        policy,
    ));

    let hub = Arc::new(EventHub::new());
    let monitor = Arc::new(ConnectivityMonitor::new());

    let coordinator = Arc::new(
        SyncCoordinator::new(
            Arc::clone(&queue),
            hub.clone(),
            Arc::clone(&background),
            config.settle_delay(),
        )
        .with_completion(Box::new(|result: SyncResult| {
            info!(success = result.success, failed = result.failed, "Sync run complete");
        })),
    );

    // Spawn tasks
    let probe = Arc::new(HttpProbe::new(config.probe_target(), config.request_timeout())?);
    let probe_interval = config.probe_interval();
    let monitor_task = tokio::spawn(Arc::clone(&monitor).run(probe, probe_interval));

    let sync_task = tokio::spawn(Arc::clone(&coordinator).run(Arc::clone(&monitor)));

    let relay_task = tokio::spawn(Arc::clone(&hub).forward_connectivity(Arc::clone(&monitor)));

    // Actions left over from a previous run get drained as soon as possible
    match queue.pending_count().await {
        Ok(0) => {}
        Ok(pending) => {
            info!(pending, "Queued actions found from a previous run");
            queue.request_background_sync("startup-drain");
        }
        Err(e) => warn!(error = %e, "Failed to count queued actions"),
    }

    // Start HTTP server
    let push = Arc::new(PushHandler::new(hub.clone(), app_origin));
    let handlers = Arc::new(ApiHandlers::new(
        Arc::clone(&queue),
        Arc::clone(&coordinator),
        Arc::clone(&monitor),
        push,
        Arc::clone(&hub),
    ));
    let http_server = HttpServer::new(handlers, config.local_api_bind);
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.serve().await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("All services started. Waiting for shutdown signal...");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal (Ctrl+C)");
        }
        Err(err) => {
            error!(error = %err, "Unable to listen for shutdown signal");
        }
    }

    info!("Initiating shutdown...");

    monitor_task.abort();
    sync_task.abort();
    relay_task.abort();
    http_task.abort();

    info!("Shutdown complete");
    Ok(())
}
