//! Background executor for scheduled chunks.
//!
//! The worker claims due chunks from the queue and runs them one at a time,
//! so chunks of one run never overlap within a worker. Several workers may
//! share a database queue: a chunk is claimed by exactly one of them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use super::errors::SyncError;
use super::orchestrator::SyncOrchestrator;
use super::types::ChunkOutcome;

/// How often an idle worker polls the queue.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Counts of what a drain did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrainStats {
    pub executed: usize,
    pub orphaned: usize,
    pub completed: usize,
    pub failed: usize,
}

impl DrainStats {
    fn merge(&mut self, other: DrainStats) {
        self.executed += other.executed;
        self.orphaned += other.orphaned;
        self.completed += other.completed;
        self.failed += other.failed;
    }

    fn record(&mut self, outcome: &ChunkOutcome) {
        self.executed += 1;
        match outcome {
            ChunkOutcome::Orphaned => self.orphaned += 1,
            ChunkOutcome::Completed(_) => self.completed += 1,
            ChunkOutcome::Failed(_) => self.failed += 1,
            ChunkOutcome::Advanced(_) => {}
        }
    }
}

/// Drains the chunk queue into the orchestrator.
pub struct ChunkWorker {
    orchestrator: Arc<SyncOrchestrator>,
    poll_interval: Duration,
}

impl ChunkWorker {
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self {
            orchestrator,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run every chunk that is due now. A successor scheduled with a
    /// positive `chunk_delay` is not due yet and is left in the queue.
    pub async fn run_pending(&self) -> Result<DrainStats, SyncError> {
        let mut stats = DrainStats::default();
        let queue = self.orchestrator.queue();

        while let Some(chunk) = queue.next_due(Utc::now()).await? {
            tracing::debug!(chunk = %chunk.id, "Running chunk");
            let outcome = self.orchestrator.run_chunk(&chunk.run_token).await?;
            stats.record(&outcome);
        }

        Ok(stats)
    }

    /// Drain the queue completely, waiting out `chunk_delay` for successors,
    /// then return. Ends once no chunk is scheduled, which happens when every
    /// run has completed, failed or been orphaned.
    pub async fn run_until_idle(&self) -> Result<DrainStats, SyncError> {
        let mut total = DrainStats::default();
        let queue = self.orchestrator.queue();
        let wait = self
            .orchestrator
            .config()
            .chunk_delay
            .min(self.poll_interval);

        loop {
            total.merge(self.run_pending().await?);
            if queue.pending().await? == 0 {
                return Ok(total);
            }
            tokio::time::sleep(wait).await;
        }
    }

    /// Poll until `should_stop` returns true, sleeping between empty polls.
    ///
    /// Store and queue failures are logged and retried on the next poll.
    pub async fn run(&self, should_stop: impl Fn() -> bool) -> DrainStats {
        let mut total = DrainStats::default();

        while !should_stop() {
            match self.run_pending().await {
                Ok(stats) => total.merge(stats),
                Err(e) => tracing::error!(error = %e, "Chunk worker poll failed"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        tracing::info!(
            executed = total.executed,
            completed = total.completed,
            failed = total.failed,
            "Chunk worker stopped"
        );
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockTransport;
    use crate::ingest::{IngestionClient, IngestionConfig};
    use crate::queue::{ChunkQueue, MemoryChunkQueue};
    use crate::retry::RetryConfig;
    use crate::source::{MemoryOrderSource, RawOrder};
    use crate::store::{MemoryProgressStore, RunToken};
    use crate::sync::SyncConfig;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn orchestrator(n: u64, queue: Arc<MemoryChunkQueue>) -> Arc<SyncOrchestrator> {
        orchestrator_with_delay(n, queue, Duration::ZERO)
    }

    fn orchestrator_with_delay(
        n: u64,
        queue: Arc<MemoryChunkQueue>,
        chunk_delay: Duration,
    ) -> Arc<SyncOrchestrator> {
        let orders: Vec<RawOrder> = (1..=n)
            .map(|id| {
                serde_json::from_value(json!({
                    "id": id,
                    "status": "processing",
                    "currency": "USD",
                    "created_at": "2024-01-01T00:00:00Z",
                    "total": "5.00"
                }))
                .unwrap()
            })
            .collect();
        let transport = MockTransport::new();
        transport.set_fallback(MockTransport::json_response(200, json!({"accepted": 20})));
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

        Arc::new(
            SyncOrchestrator::new(
                Arc::new(MemoryProgressStore::new()),
                Arc::new(MemoryOrderSource::new(orders)),
                Arc::new(ingestor),
                queue,
                SyncConfig {
                    chunk_delay,
                    ..SyncConfig::default()
                },
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn run_pending_drains_a_whole_run() {
        let queue = Arc::new(MemoryChunkQueue::new());
        let orchestrator = orchestrator(55, queue.clone());
        orchestrator.start().await.unwrap();

        let stats = ChunkWorker::new(orchestrator.clone())
            .run_pending()
            .await
            .unwrap();
        assert_eq!(
            stats,
            DrainStats {
                executed: 3,
                orphaned: 0,
                completed: 1,
                failed: 0,
            }
        );
        assert_eq!(queue.pending().await.unwrap(), 0);
        assert_eq!(orchestrator.progress().await.unwrap().processed_orders, 55);
    }

    #[tokio::test]
    async fn run_pending_leaves_delayed_successors_queued() {
        let queue = Arc::new(MemoryChunkQueue::new());
        let orchestrator = orchestrator_with_delay(55, queue.clone(), Duration::from_secs(60));
        orchestrator.start().await.unwrap();

        let stats = ChunkWorker::new(orchestrator.clone())
            .run_pending()
            .await
            .unwrap();
        assert_eq!(stats.executed, 1);
        assert_eq!(queue.pending().await.unwrap(), 1);
        assert_eq!(orchestrator.progress().await.unwrap().processed_orders, 20);
    }

    #[tokio::test]
    async fn run_until_idle_waits_for_delayed_successors() {
        let queue = Arc::new(MemoryChunkQueue::new());
        let orchestrator = orchestrator_with_delay(55, queue.clone(), Duration::from_millis(20));
        orchestrator.start().await.unwrap();

        let stats = tokio::time::timeout(
            Duration::from_secs(5),
            ChunkWorker::new(orchestrator.clone()).run_until_idle(),
        )
        .await
        .expect("drain should finish")
        .unwrap();
        assert_eq!(stats.executed, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(queue.pending().await.unwrap(), 0);

        let done = orchestrator.progress().await.unwrap();
        assert_eq!(done.status, crate::entity::sync_status::SyncStatus::Completed);
        assert_eq!(done.processed_orders, 55);
    }

    #[tokio::test]
    async fn orphaned_chunks_are_counted_and_dropped() {
        let queue = Arc::new(MemoryChunkQueue::new());
        let orchestrator = orchestrator(5, queue.clone());
        queue
            .schedule_chunk(&RunToken::new("ghost"), Duration::ZERO)
            .await
            .unwrap();

        let stats = ChunkWorker::new(orchestrator).run_pending().await.unwrap();
        assert_eq!(stats.orphaned, 1);
        assert_eq!(queue.pending().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_asked() {
        let queue = Arc::new(MemoryChunkQueue::new());
        let orchestrator = orchestrator(5, queue);
        orchestrator.start().await.unwrap();

        let polls = AtomicUsize::new(0);
        let stats = ChunkWorker::new(orchestrator)
            .with_poll_interval(Duration::from_millis(100))
            .run(|| polls.fetch_add(1, Ordering::SeqCst) >= 2)
            .await;

        assert_eq!(stats.completed, 1);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }
}
