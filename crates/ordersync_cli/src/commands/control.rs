//! `start`, `progress`, `reset` and `run-chunk`: the gateway as subcommands.

use std::time::Duration;

use chrono::Utc;
use ordersync::entity::sync_status::SyncStatus;
use ordersync::store::ProgressStore;
use ordersync::sync::ProgressSnapshot;

use crate::commands::shared::{emit, open_gateway, open_progress_store, print_json};
use crate::config::Config;
use crate::progress::ProgressWatcher;
use crate::shutdown::{is_shutdown_requested, setup_shutdown_handler};

pub(crate) async fn handle_start(
    config: &Config,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = open_gateway(config, database_url).await?;
    emit(gateway.start_sync().await)
}

pub(crate) async fn handle_reset(
    force: bool,
    config: &Config,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = open_gateway(config, database_url).await?;
    emit(gateway.reset_sync_progress(force).await)
}

pub(crate) async fn handle_run_chunk(
    token: &str,
    config: &Config,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = open_gateway(config, database_url).await?;
    emit(gateway.run_chunk(token).await)
}

/// Print the current snapshot, or follow the run until it reaches a
/// terminal status when `watch` is set.
pub(crate) async fn handle_progress(
    watch: bool,
    interval: Duration,
    config: &Config,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_progress_store(config, database_url).await?;
    let stale_after = config.engine().stale_after;

    let read = || async {
        let progress = store.get().await?;
        Ok::<_, Box<dyn std::error::Error>>(ProgressSnapshot::observe(
            &progress,
            Utc::now(),
            stale_after,
        ))
    };

    if !watch {
        return print_json(&read().await?);
    }

    setup_shutdown_handler();
    let mut watcher = ProgressWatcher::new();
    loop {
        let snapshot = read().await?;
        watcher.update(&snapshot);

        // Idle and stalled runs do not move without another command.
        let settled = snapshot.is_terminal()
            || matches!(snapshot.status, SyncStatus::Idle | SyncStatus::Stalled);
        if settled || is_shutdown_requested() {
            watcher.finish(&snapshot);
            return print_json(&snapshot);
        }
        tokio::time::sleep(interval).await;
    }
}
