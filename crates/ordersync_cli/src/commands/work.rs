use std::time::Duration;

use ordersync::sync::ChunkWorker;

use crate::commands::shared::{open_orchestrator, print_json};
use crate::config::Config;
use crate::shutdown::{is_shutdown_requested, setup_shutdown_handler};

/// Execute scheduled chunks.
///
/// With `once`, run chunks until the queue is empty, waiting out
/// `chunk_delay` between a chunk and its successor, and exit. Otherwise poll
/// until Ctrl+C; the chunk in flight finishes before the worker stops.
pub(crate) async fn handle_work(
    once: bool,
    poll_interval: Option<Duration>,
    config: &Config,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = open_orchestrator(config, database_url).await?;
    let worker = ChunkWorker::new(orchestrator)
        .with_poll_interval(poll_interval.unwrap_or_else(|| config.poll_interval()));

    let stats = if once {
        worker.run_until_idle().await?
    } else {
        setup_shutdown_handler();
        tracing::info!("Chunk worker started, press Ctrl+C to stop");
        worker.run(is_shutdown_requested).await
    };

    print_json(&stats)
}
