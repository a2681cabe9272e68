use std::sync::Arc;

use ordersync::connect_and_migrate;
use ordersync::ingest::IngestionClient;
use ordersync::queue::DatabaseChunkQueue;
use ordersync::source::WooCommerceOrderSource;
use ordersync::store::DatabaseProgressStore;
use ordersync::sync::{ErrorPayload, SyncGateway, SyncOrchestrator};
use serde::Serialize;

use crate::config::Config;

/// Open the database and wire the orchestrator against the configured store
/// and ingestion endpoint.
pub(crate) async fn open_orchestrator(
    config: &Config,
    database_url: &str,
) -> Result<Arc<SyncOrchestrator>, Box<dyn std::error::Error>> {
    let db = Arc::new(connect_and_migrate(database_url).await?);
    let record = config.database.record.as_str();

    let source = WooCommerceOrderSource::new(&config.woocommerce()?)?;
    let ingestor = IngestionClient::new(&config.ingestion()?)?;

    let orchestrator = SyncOrchestrator::new(
        Arc::new(DatabaseProgressStore::new(Arc::clone(&db), record)),
        Arc::new(source),
        Arc::new(ingestor),
        Arc::new(DatabaseChunkQueue::new(db, record)),
        config.engine(),
    )?;

    Ok(Arc::new(orchestrator))
}

pub(crate) async fn open_gateway(
    config: &Config,
    database_url: &str,
) -> Result<SyncGateway, Box<dyn std::error::Error>> {
    Ok(SyncGateway::new(open_orchestrator(config, database_url).await?))
}

/// Progress reads need neither store credentials nor the ingestion endpoint.
pub(crate) async fn open_progress_store(
    config: &Config,
    database_url: &str,
) -> Result<DatabaseProgressStore, Box<dyn std::error::Error>> {
    let db = Arc::new(connect_and_migrate(database_url).await?);
    Ok(DatabaseProgressStore::new(db, config.database.record.as_str()))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a gateway answer as JSON. Error payloads go to stdout too, and the
/// process exits non-zero.
pub(crate) fn emit<T: Serialize>(
    result: Result<T, ErrorPayload>,
) -> Result<(), Box<dyn std::error::Error>> {
    match result {
        Ok(value) => print_json(&value),
        Err(payload) => {
            tracing::debug!(code = %payload.code, "Gateway returned an error");
            print_json(&payload)?;
            std::process::exit(1);
        }
    }
}
