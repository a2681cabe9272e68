//! Control surface over the orchestrator.
//!
//! Every operation answers with a JSON-serializable [`ProgressSnapshot`] or
//! an [`ErrorPayload`]. The run token never leaves the library through a
//! snapshot; chunks carry it through the queue instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::sync_status::SyncStatus;
use crate::store::{RunToken, SyncProgress};

use super::errors::SyncError;
use super::orchestrator::SyncOrchestrator;
use super::types::StartOutcome;

/// What callers see of the progress record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Observed status: `stalled` replaces a stale active status.
    pub status: SyncStatus,
    pub processed_orders: u64,
    pub skipped_orders: u64,
    pub total_orders: Option<u64>,
    pub percent_complete: Option<f64>,
    pub cursor: Option<String>,
    /// A failed or stalled run that `start` would continue from its cursor.
    pub resumable: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ProgressSnapshot {
    pub fn observe(progress: &SyncProgress, now: DateTime<Utc>, stale_after: std::time::Duration) -> Self {
        let status = progress.observed_status(now, stale_after);
        let resumable = status == SyncStatus::Stalled
            || (status == SyncStatus::Error && progress.cursor.is_some());

        Self {
            status,
            processed_orders: progress.processed_orders,
            skipped_orders: progress.skipped_orders,
            total_orders: progress.total_orders,
            percent_complete: progress.percent_complete(),
            cursor: progress.cursor.as_ref().map(|c| c.as_str().to_string()),
            resumable,
            started_at: progress.started_at,
            last_updated_at: progress.last_updated_at,
            last_synced_at: progress.last_synced_at,
            last_error: progress.last_error.clone(),
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Error answer of the control surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl From<SyncError> for ErrorPayload {
    fn from(err: SyncError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// The trigger/reset gateway.
#[derive(Clone)]
pub struct SyncGateway {
    orchestrator: Arc<SyncOrchestrator>,
}

impl SyncGateway {
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    fn snapshot(&self, progress: &SyncProgress) -> ProgressSnapshot {
        ProgressSnapshot::observe(progress, Utc::now(), self.orchestrator.config().stale_after)
    }

    /// Start or resume a sync. Starting while a run is live returns that
    /// run's snapshot unchanged.
    pub async fn start_sync(&self) -> Result<ProgressSnapshot, ErrorPayload> {
        let outcome = self.orchestrator.start().await.map_err(|e| {
            tracing::error!(error = %e, "Start failed");
            ErrorPayload::from(e)
        })?;
        if let StartOutcome::Started { resumed: true, .. } = outcome {
            tracing::info!("Resuming interrupted sync");
        }
        Ok(self.snapshot(outcome.progress()))
    }

    pub async fn get_sync_progress(&self) -> Result<ProgressSnapshot, ErrorPayload> {
        let progress = self.orchestrator.progress().await?;
        Ok(self.snapshot(&progress))
    }

    /// Reset to `idle`. Refused with `sync_in_progress` while a run is
    /// active and not stale, unless `force_reset` is set.
    pub async fn reset_sync_progress(
        &self,
        force_reset: bool,
    ) -> Result<ProgressSnapshot, ErrorPayload> {
        let progress = self.orchestrator.reset(force_reset).await?;
        Ok(self.snapshot(&progress))
    }

    /// Run the chunk scheduled under `run_token`. Stale tokens are a no-op
    /// that returns the current snapshot.
    pub async fn run_chunk(&self, run_token: &str) -> Result<ProgressSnapshot, ErrorPayload> {
        if run_token.trim().is_empty() {
            return Err(SyncError::UnknownToken.into());
        }
        let outcome = self
            .orchestrator
            .run_chunk(&RunToken::new(run_token.trim()))
            .await?;
        match outcome.progress() {
            Some(progress) => Ok(self.snapshot(progress)),
            None => self.get_sync_progress().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockTransport;
    use crate::ingest::{IngestionClient, IngestionConfig};
    use crate::queue::{ChunkQueue, MemoryChunkQueue};
    use crate::retry::RetryConfig;
    use crate::source::{Cursor, MemoryOrderSource, RawOrder};
    use crate::store::MemoryProgressStore;
    use crate::sync::SyncConfig;
    use chrono::TimeDelta;
    use serde_json::json;
    use std::time::Duration;

    fn orders(n: u64) -> Vec<RawOrder> {
        (1..=n)
            .map(|id| {
                serde_json::from_value(json!({
                    "id": id,
                    "status": "completed",
                    "currency": "EUR",
                    "created_at": "2024-02-01T09:30:00Z",
                    "total": "12.50"
                }))
                .unwrap()
            })
            .collect()
    }

    fn gateway(store: MemoryProgressStore) -> (SyncGateway, Arc<MemoryChunkQueue>) {
        gateway_with_orders(store, orders(5))
    }

    fn gateway_with_orders(
        store: MemoryProgressStore,
        orders: Vec<RawOrder>,
    ) -> (SyncGateway, Arc<MemoryChunkQueue>) {
        let transport = MockTransport::new();
        transport.set_fallback(MockTransport::json_response(200, json!({"accepted": 0})));
        let ingestor = IngestionClient::new_with_transport(
            &IngestionConfig {
                endpoint: "https://ingest.example.com".to_string(),
                site_id: "site".to_string(),
                api_token: "token".to_string(),
                timeout: Duration::from_secs(30),
                retry: RetryConfig::default(),
            },
            Arc::new(transport),
        )
        .unwrap();
        let queue = Arc::new(MemoryChunkQueue::new());
        let orchestrator = SyncOrchestrator::new(
            Arc::new(store),
            Arc::new(MemoryOrderSource::new(orders)),
            Arc::new(ingestor),
            queue.clone(),
            SyncConfig {
                chunk_delay: Duration::ZERO,
                ..SyncConfig::default()
            },
        )
        .unwrap();
        (SyncGateway::new(Arc::new(orchestrator)), queue)
    }

    fn stalled_record() -> SyncProgress {
        SyncProgress {
            status: SyncStatus::InProgress,
            processed_orders: 40,
            total_orders: Some(55),
            cursor: Some(Cursor::new("40")),
            run_token: Some(RunToken::new("old")),
            last_updated_at: Some(Utc::now() - TimeDelta::minutes(6)),
            ..SyncProgress::default()
        }
    }

    #[tokio::test]
    async fn progress_reports_stalled_without_persisting_it() {
        let store = MemoryProgressStore::with_record(stalled_record());
        let (gateway, _) = gateway(store);

        let snapshot = gateway.get_sync_progress().await.unwrap();
        assert_eq!(snapshot.status, SyncStatus::Stalled);
        assert!(snapshot.resumable);
        assert_eq!(snapshot.percent_complete, Some(72.7));

        let persisted = gateway.orchestrator().progress().await.unwrap();
        assert_eq!(persisted.status, SyncStatus::InProgress);
    }

    #[tokio::test]
    async fn snapshot_json_hides_token() {
        let store = MemoryProgressStore::with_record(stalled_record());
        let (gateway, _) = gateway(store);

        let value = serde_json::to_value(gateway.get_sync_progress().await.unwrap()).unwrap();
        assert_eq!(value["status"], json!("stalled"));
        assert_eq!(value["processed_orders"], json!(40));
        assert!(value.get("run_token").is_none());
    }

    #[tokio::test]
    async fn reset_refusal_is_a_sync_in_progress_payload() {
        let (gateway, _) = gateway(MemoryProgressStore::new());
        gateway.start_sync().await.unwrap();

        let err = gateway.reset_sync_progress(false).await.unwrap_err();
        assert_eq!(err.code, "sync_in_progress");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], json!("sync_in_progress"));
        assert!(value["message"].as_str().unwrap().contains("in progress"));
    }

    #[tokio::test]
    async fn stalled_run_may_be_reset_without_force() {
        let (gateway, _) = gateway(MemoryProgressStore::with_record(stalled_record()));
        let snapshot = gateway.reset_sync_progress(false).await.unwrap();
        assert_eq!(snapshot.status, SyncStatus::Idle);
        assert_eq!(snapshot.processed_orders, 0);
    }

    #[tokio::test]
    async fn force_reset_clears_everything() {
        let (gateway, queue) = gateway(MemoryProgressStore::new());
        gateway.start_sync().await.unwrap();

        let snapshot = gateway.reset_sync_progress(true).await.unwrap();
        assert_eq!(snapshot.status, SyncStatus::Idle);
        assert_eq!(snapshot.last_synced_at, None);
        assert_eq!(queue.pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_store_completes_on_start() {
        let (gateway, queue) = gateway_with_orders(MemoryProgressStore::new(), Vec::new());
        let started = gateway.start_sync().await.unwrap();
        assert_eq!(started.status, SyncStatus::Completed);
        assert_eq!(started.processed_orders, 0);
        assert_eq!(started.total_orders, Some(0));
        assert!(started.is_terminal());
        assert_eq!(queue.pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn started_run_completes_through_run_chunk() {
        let (gateway, queue) = gateway(MemoryProgressStore::new());
        let started = gateway.start_sync().await.unwrap();
        assert_eq!(started.status, SyncStatus::Starting);
        assert_eq!(started.total_orders, Some(5));

        let chunk = queue.next_due(Utc::now()).await.unwrap().unwrap();
        let done = gateway.run_chunk(chunk.run_token.as_str()).await.unwrap();
        assert_eq!(done.status, SyncStatus::Completed);
        assert_eq!(done.processed_orders, 5);
        assert!(done.is_terminal());
    }

    #[tokio::test]
    async fn run_chunk_with_stale_token_returns_current_snapshot() {
        let (gateway, _) = gateway(MemoryProgressStore::new());
        let snapshot = gateway.run_chunk("not-a-live-token").await.unwrap();
        assert_eq!(snapshot.status, SyncStatus::Idle);

        let err = gateway.run_chunk("  ").await.unwrap_err();
        assert_eq!(err.code, "invalid_token");
    }
}
