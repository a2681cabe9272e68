//! The sync state machine.
//!
//! ```text
//! idle/completed/error ──start──▶ starting ──chunk──▶ in_progress ──last page──▶ completed
//!                                     │                    │
//!                                     └──────failure───────┴──▶ error (cursor kept)
//! ```
//!
//! A fresh start counts the orders before scheduling anything; a store
//! without orders goes straight from `start` to `completed`.
//!
//! Every write made on behalf of a run is gated on its token, so a run that
//! lost its token (force reset, or a stalled run that was resumed) can no
//! longer change anything.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use crate::entity::sync_status::SyncStatus;
use crate::ingest::{IngestionError, OrderIngestor};
use crate::queue::ChunkQueue;
use crate::retry::with_retry;
use crate::source::{Cursor, OrderSource, SourceError};
use crate::store::{ProgressPatch, ProgressStore, RunToken, SyncProgress};
use crate::transform::{BatchTransformer, OrderBatch};

use super::errors::SyncError;
use super::types::{CLAIM_ATTEMPTS, ChunkOutcome, StartOutcome, SyncConfig};

/// Why a page could not be committed.
#[derive(Debug, Error)]
enum PageError {
    #[error("order count failed: {0}")]
    Count(#[source] SourceError),

    #[error("order fetch failed: {0}")]
    Fetch(#[source] SourceError),

    #[error("ingestion of batch {index} failed: {source}")]
    Ingest {
        index: usize,
        #[source]
        source: IngestionError,
    },
}

/// A fetched, transformed and delivered page, ready to commit.
struct DeliveredPage {
    walked: u64,
    skipped: u64,
    next_cursor: Option<Cursor>,
    is_last: bool,
}

/// Drives sync runs over the configured ports.
pub struct SyncOrchestrator {
    store: Arc<dyn ProgressStore>,
    source: Arc<dyn OrderSource>,
    ingestor: Arc<dyn OrderIngestor>,
    queue: Arc<dyn ChunkQueue>,
    transformer: BatchTransformer,
    config: SyncConfig,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        source: Arc<dyn OrderSource>,
        ingestor: Arc<dyn OrderIngestor>,
        queue: Arc<dyn ChunkQueue>,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        Ok(Self {
            store,
            source,
            ingestor,
            queue,
            transformer: BatchTransformer::new(config.transform_config()),
            config,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<dyn ChunkQueue> {
        &self.queue
    }

    /// The persisted record, unmodified.
    pub async fn progress(&self) -> Result<SyncProgress, SyncError> {
        Ok(self.store.get().await?)
    }

    /// Start a run, resume an interrupted one, or report the live one.
    pub async fn start(&self) -> Result<StartOutcome, SyncError> {
        for attempt in 1..=CLAIM_ATTEMPTS {
            let now = Utc::now();
            let current = self.store.get().await?;
            let stale = current.is_stale(now, self.config.stale_after);

            if current.status.is_active() && !stale {
                tracing::info!(status = %current.status, "Sync already running");
                return Ok(StartOutcome::AlreadyRunning { progress: current });
            }

            let resumed = stale || (current.status == SyncStatus::Error && current.cursor.is_some());
            let token = RunToken::mint();

            let mut claim = ProgressPatch::new()
                .status(SyncStatus::Starting)
                .started_at(Some(now))
                .last_error(None)
                .touched(now);
            if !resumed {
                claim = claim.processed(0).skipped(0).total(None).cursor(None);
            }

            let claimed = self
                .store
                .compare_and_swap_token(current.run_token.as_ref(), Some(&token), claim)
                .await?;
            if !claimed {
                tracing::debug!(attempt, "Run token changed while claiming, retrying");
                continue;
            }

            // Fresh runs are counted here; a resumed run keeps its stored total.
            if !resumed {
                match self.call_source("count orders", || self.source.count_orders()).await {
                    Ok(0) => {
                        let progress = self.complete_empty(&token).await?;
                        return Ok(StartOutcome::Started {
                            progress,
                            token,
                            resumed,
                        });
                    }
                    Ok(count) => {
                        let patch = ProgressPatch::new().total(Some(count)).touched(Utc::now());
                        if self.store.set_for_run(&token, patch).await?.is_none() {
                            tracing::debug!(token = %token, "Run token replaced while counting");
                        }
                    }
                    Err(e) => {
                        let message = PageError::Count(e).to_string();
                        let progress = match self.fail_run(&token, None, message).await? {
                            ChunkOutcome::Failed(failed) => failed,
                            _ => self.store.get().await?,
                        };
                        return Ok(StartOutcome::Started {
                            progress,
                            token,
                            resumed,
                        });
                    }
                }
            }

            if let Err(e) = self.queue.schedule_chunk(&token, Duration::ZERO).await {
                self.fail_run(&token, None, format!("could not schedule first chunk: {e}"))
                    .await?;
                return Err(e.into());
            }

            let progress = self.store.get().await?;
            tracing::info!(
                resumed,
                processed = progress.processed_orders,
                cursor = progress.cursor.as_ref().map(Cursor::as_str),
                "Sync run started"
            );
            return Ok(StartOutcome::Started {
                progress,
                token,
                resumed,
            });
        }

        Err(SyncError::Contended {
            attempts: CLAIM_ATTEMPTS,
        })
    }

    /// Return the record to `idle`.
    ///
    /// Without `force`, an active run that is not stale is left alone and
    /// [`SyncError::InProgress`] is returned. With `force`, every field is
    /// cleared unconditionally, which orphans any live run.
    pub async fn reset(&self, force: bool) -> Result<SyncProgress, SyncError> {
        if force {
            let dropped = self.queue.clear().await?;
            let progress = self.store.set(ProgressPatch::cleared()).await?;
            tracing::info!(dropped_chunks = dropped, "Sync progress force reset");
            return Ok(progress);
        }

        let current = self.store.get().await?;
        if current.status.is_active() && !current.is_stale(Utc::now(), self.config.stale_after) {
            return Err(SyncError::InProgress);
        }

        let cleared = self
            .store
            .compare_and_swap_token(current.run_token.as_ref(), None, ProgressPatch::cleared())
            .await?;
        if !cleared {
            return Err(SyncError::InProgress);
        }

        let dropped = self.queue.clear().await?;
        tracing::info!(dropped_chunks = dropped, "Sync progress reset");
        Ok(self.store.get().await?)
    }

    /// Execute one chunk of the run owned by `token`.
    ///
    /// Page failures end the run in `error` and are reported as
    /// [`ChunkOutcome::Failed`]; only store and queue failures are returned
    /// as errors.
    pub async fn run_chunk(&self, token: &RunToken) -> Result<ChunkOutcome, SyncError> {
        let current = self.store.get().await?;
        if !current.is_live(token) || !current.status.is_active() {
            tracing::debug!(token = %token, "Discarding orphaned chunk");
            return Ok(ChunkOutcome::Orphaned);
        }

        let mark = ProgressPatch::new()
            .status(SyncStatus::InProgress)
            .touched(Utc::now());
        let Some(progress) = self.store.set_for_run(token, mark).await? else {
            tracing::debug!(token = %token, "Run token replaced before chunk started");
            return Ok(ChunkOutcome::Orphaned);
        };

        let mut total = progress.total_orders;
        match self.process_page(&progress, &mut total).await {
            Ok(page) => self.commit_page(token, &progress, total, page).await,
            Err(e) => self.fail_run(token, total, e.to_string()).await,
        }
    }

    /// Fetch, transform and deliver the page at the stored cursor.
    async fn process_page(
        &self,
        progress: &SyncProgress,
        total: &mut Option<u64>,
    ) -> Result<DeliveredPage, PageError> {
        if total.is_none() {
            let count = self
                .call_source("count orders", || self.source.count_orders())
                .await
                .map_err(PageError::Count)?;
            *total = Some(count);
        }

        let cursor = progress.cursor.as_ref();
        let page = self
            .call_source("list orders", || {
                self.source.list_orders(cursor, self.config.page_size)
            })
            .await
            .map_err(PageError::Fetch)?;

        let is_last = page.is_last();
        let walked = page.orders.len() as u64;
        let transformed = self.transformer.transform_page(&page.orders);
        let skipped = transformed.skipped.len() as u64;

        tracing::debug!(
            source = self.source.name(),
            cursor = cursor.map(Cursor::as_str),
            orders = walked,
            events = transformed.events.len(),
            excluded = transformed.excluded,
            skipped,
            "Fetched page"
        );

        // `batch_size >= page_size`, so this is at most one batch.
        let batches = OrderBatch::split(cursor, transformed.events, self.config.batch_size);
        for batch in &batches {
            self.ingestor
                .send_batch(batch)
                .await
                .map_err(|source| PageError::Ingest {
                    index: batch.index,
                    source,
                })?;
        }

        Ok(DeliveredPage {
            walked,
            skipped,
            next_cursor: page.next_cursor,
            is_last,
        })
    }

    async fn commit_page(
        &self,
        token: &RunToken,
        progress: &SyncProgress,
        total: Option<u64>,
        page: DeliveredPage,
    ) -> Result<ChunkOutcome, SyncError> {
        let now = Utc::now();
        let processed = progress.processed_orders + page.walked;
        let skipped = progress.skipped_orders + page.skipped;

        if page.is_last {
            let patch = ProgressPatch::new()
                .status(SyncStatus::Completed)
                .processed(processed)
                .skipped(skipped)
                .total(Some(processed))
                .cursor(None)
                .run_token(None)
                .last_error(None)
                .synced_at(Some(now))
                .touched(now);
            let Some(done) = self.store.set_for_run(token, patch).await? else {
                return Ok(ChunkOutcome::Orphaned);
            };
            tracing::info!(
                processed = done.processed_orders,
                skipped = done.skipped_orders,
                "Order history sync completed"
            );
            return Ok(ChunkOutcome::Completed(done));
        }

        let patch = ProgressPatch::new()
            .status(SyncStatus::InProgress)
            .processed(processed)
            .skipped(skipped)
            .total(total)
            .cursor(page.next_cursor)
            .touched(now);
        let Some(advanced) = self.store.set_for_run(token, patch).await? else {
            return Ok(ChunkOutcome::Orphaned);
        };

        if let Err(e) = self.queue.schedule_chunk(token, self.config.chunk_delay).await {
            return self
                .fail_run(token, total, format!("could not schedule next chunk: {e}"))
                .await;
        }

        tracing::info!(
            processed = advanced.processed_orders,
            total = advanced.total_orders,
            "Sync chunk committed"
        );
        Ok(ChunkOutcome::Advanced(advanced))
    }

    /// Finish a fresh run over a store without orders. No chunk is scheduled.
    async fn complete_empty(&self, token: &RunToken) -> Result<SyncProgress, SyncError> {
        let now = Utc::now();
        let patch = ProgressPatch::new()
            .status(SyncStatus::Completed)
            .processed(0)
            .skipped(0)
            .total(Some(0))
            .cursor(None)
            .run_token(None)
            .synced_at(Some(now))
            .touched(now);
        match self.store.set_for_run(token, patch).await? {
            Some(done) => {
                tracing::info!("Store has no orders, sync completed without chunks");
                Ok(done)
            }
            None => Ok(self.store.get().await?),
        }
    }

    /// Move the run to `error`, keeping the cursor where the failed page began.
    async fn fail_run(
        &self,
        token: &RunToken,
        total: Option<u64>,
        message: String,
    ) -> Result<ChunkOutcome, SyncError> {
        let mut patch = ProgressPatch::new()
            .status(SyncStatus::Error)
            .run_token(None)
            .last_error(Some(message.clone()))
            .touched(Utc::now());
        if total.is_some() {
            patch = patch.total(total);
        }

        match self.store.set_for_run(token, patch).await? {
            Some(failed) => {
                tracing::error!(error = %message, processed = failed.processed_orders, "Sync run failed");
                Ok(ChunkOutcome::Failed(failed))
            }
            None => {
                tracing::debug!(error = %message, "Failure of an orphaned run ignored");
                Ok(ChunkOutcome::Orphaned)
            }
        }
    }

    /// Call the order source with a per-attempt timeout and retries.
    async fn call_source<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let timeout = self.config.request_timeout;
        with_retry(
            || {
                let attempt = operation();
                async move {
                    match tokio::time::timeout(timeout, attempt).await {
                        Ok(result) => result,
                        Err(_) => Err(SourceError::Timeout),
                    }
                }
            },
            SourceError::is_transient,
            &self.config.retry_config(),
            what,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, HttpRequest, MockTransport};
    use crate::ingest::{IngestionClient, IngestionConfig};
    use crate::queue::MemoryChunkQueue;
    use crate::retry::RetryConfig;
    use crate::source::{MemoryOrderSource, RawOrder};
    use crate::store::MemoryProgressStore;
    use chrono::TimeDelta;
    use serde_json::json;

    const INGEST_URL: &str = "https://ingest.example.com/v1/orders/batch";

    struct Harness {
        store: Arc<MemoryProgressStore>,
        source: Arc<MemoryOrderSource>,
        queue: Arc<MemoryChunkQueue>,
        transport: MockTransport,
        orchestrator: SyncOrchestrator,
    }

    fn order(id: u64) -> RawOrder {
        serde_json::from_value(json!({
            "id": id,
            "number": id.to_string(),
            "status": "completed",
            "currency": "USD",
            "created_at": "2024-01-01T00:00:00Z",
            "total": "10.00"
        }))
        .unwrap()
    }

    fn config() -> SyncConfig {
        SyncConfig {
            chunk_delay: Duration::ZERO,
            min_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
            ..SyncConfig::default()
        }
    }

    fn harness_with(orders: Vec<RawOrder>, store: MemoryProgressStore) -> Harness {
        let store = Arc::new(store);
        let source = Arc::new(MemoryOrderSource::new(orders));
        let queue = Arc::new(MemoryChunkQueue::new());
        let transport = MockTransport::new();
        transport.set_fallback(MockTransport::json_response(200, json!({"accepted": 20})));

        let ingestor = IngestionClient::new_with_transport(
            &IngestionConfig {
                endpoint: "https://ingest.example.com".to_string(),
                site_id: "site".to_string(),
                api_token: "token".to_string(),
                timeout: Duration::from_secs(30),
                retry: RetryConfig::new(Duration::from_millis(10), Duration::from_millis(40), 3)
                    .with_jitter(false),
            },
            Arc::new(transport.clone()),
        )
        .unwrap();

        let orchestrator = SyncOrchestrator::new(
            store.clone(),
            source.clone(),
            Arc::new(ingestor),
            queue.clone(),
            config(),
        )
        .unwrap();

        Harness {
            store,
            source,
            queue,
            transport,
            orchestrator,
        }
    }

    fn harness(n: u64) -> Harness {
        harness_with((1..=n).map(order).collect(), MemoryProgressStore::new())
    }

    /// Run due chunks until the queue is empty.
    async fn drain(h: &Harness) -> Vec<ChunkOutcome> {
        let mut outcomes = Vec::new();
        while let Some(chunk) = h.queue.next_due(Utc::now()).await.unwrap() {
            outcomes.push(h.orchestrator.run_chunk(&chunk.run_token).await.unwrap());
        }
        outcomes
    }

    fn sent_ids(req: &HttpRequest) -> Vec<u64> {
        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        body["orders"]
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["order_id"].as_u64().unwrap())
            .collect()
    }

    fn started_token(outcome: &StartOutcome) -> RunToken {
        match outcome {
            StartOutcome::Started { token, .. } => token.clone(),
            other => panic!("expected a started run, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_orders_complete_on_start() {
        let h = harness(0);

        let outcome = h.orchestrator.start().await.unwrap();
        assert!(matches!(outcome, StartOutcome::Started { resumed: false, .. }));
        let progress = outcome.progress();
        assert_eq!(progress.status, SyncStatus::Completed);
        assert_eq!(progress.processed_orders, 0);
        assert_eq!(progress.total_orders, Some(0));
        assert!(progress.cursor.is_none());
        assert!(progress.run_token.is_none());
        assert!(progress.last_synced_at.is_some());

        assert_eq!(h.queue.pending().await.unwrap(), 0);
        assert_eq!(h.source.list_calls(), 0);
        assert!(h.transport.requests().is_empty());
        assert_eq!(&h.store.get().await.unwrap(), progress);
    }

    #[tokio::test(start_paused = true)]
    async fn start_records_total_before_first_chunk() {
        let h = harness(55);

        let outcome = h.orchestrator.start().await.unwrap();
        assert_eq!(outcome.progress().status, SyncStatus::Starting);
        assert_eq!(outcome.progress().total_orders, Some(55));
        assert_eq!(h.source.count_calls(), 1);
        assert_eq!(h.queue.pending().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn walks_all_pages_in_order() {
        let h = harness(55);
        h.orchestrator.start().await.unwrap();

        let outcomes = drain(&h).await;
        let processed: Vec<u64> = outcomes
            .iter()
            .map(|o| o.progress().unwrap().processed_orders)
            .collect();
        assert_eq!(processed, vec![20, 40, 55]);
        assert!(matches!(outcomes[0], ChunkOutcome::Advanced(_)));
        assert!(matches!(outcomes[2], ChunkOutcome::Completed(_)));

        let progress = h.store.get().await.unwrap();
        assert_eq!(progress.status, SyncStatus::Completed);
        assert_eq!(progress.total_orders, Some(55));
        assert_eq!(h.source.count_calls(), 1);

        let sent: Vec<u64> = h.transport.requests().iter().flat_map(sent_ids).collect();
        assert_eq!(sent, (1..=55).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn first_chunk_reports_total_before_completion() {
        let h = harness(55);
        h.orchestrator.start().await.unwrap();

        let chunk = h.queue.next_due(Utc::now()).await.unwrap().unwrap();
        let outcome = h.orchestrator.run_chunk(&chunk.run_token).await.unwrap();

        let progress = outcome.progress().unwrap();
        assert_eq!(progress.status, SyncStatus::InProgress);
        assert_eq!(progress.total_orders, Some(55));
        assert_eq!(progress.cursor, Some(Cursor::new("20")));
        assert_eq!(progress.percent_complete(), Some(36.4));
    }

    #[tokio::test(start_paused = true)]
    async fn ingestion_failure_fails_run_and_start_resumes_it() {
        let h = harness(55);
        h.transport.push_response(
            HttpMethod::Post,
            INGEST_URL,
            MockTransport::json_response(200, json!({"accepted": 20})),
        );
        h.transport
            .set_fallback(MockTransport::json_response(500, json!({"error": "down"})));

        h.orchestrator.start().await.unwrap();
        let outcomes = drain(&h).await;
        assert!(matches!(outcomes.as_slice(), [ChunkOutcome::Advanced(_), ChunkOutcome::Failed(_)]));
        assert_eq!(h.transport.requests().len(), 4);

        let failed = h.store.get().await.unwrap();
        assert_eq!(failed.status, SyncStatus::Error);
        assert_eq!(failed.processed_orders, 20);
        assert_eq!(failed.cursor, Some(Cursor::new("20")));
        assert!(failed.run_token.is_none());
        assert!(failed.last_error.as_deref().unwrap().contains("500"));

        h.transport
            .set_fallback(MockTransport::json_response(200, json!({"accepted": 20})));
        let restarted = h.orchestrator.start().await.unwrap();
        assert!(matches!(restarted, StartOutcome::Started { resumed: true, .. }));
        assert_eq!(restarted.progress().processed_orders, 20);
        assert!(restarted.progress().last_error.is_none());

        let outcomes = drain(&h).await;
        assert_eq!(outcomes.len(), 2);
        let done = h.store.get().await.unwrap();
        assert_eq!(done.status, SyncStatus::Completed);
        assert_eq!(done.processed_orders, 55);
        assert_eq!(done.total_orders, Some(55));
        assert_eq!(h.source.count_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_after_failed_page_resends_nothing_delivered() {
        let h = harness(40);
        h.transport.push_response(
            HttpMethod::Post,
            INGEST_URL,
            MockTransport::json_response(200, json!({"accepted": 20})),
        );
        h.transport
            .set_fallback(MockTransport::json_response(503, json!({"error": "busy"})));

        h.orchestrator.start().await.unwrap();
        drain(&h).await;
        let failed = h.store.get().await.unwrap();
        assert_eq!(failed.status, SyncStatus::Error);
        assert_eq!(failed.cursor, Some(Cursor::new("20")));

        // Each page was one request: one delivered, then three failed attempts.
        let before = h.transport.requests();
        assert_eq!(before.len(), 4);
        assert_eq!(sent_ids(&before[0]), (1..=20).collect::<Vec<_>>());

        h.transport
            .set_fallback(MockTransport::json_response(200, json!({"accepted": 20})));
        h.orchestrator.start().await.unwrap();
        drain(&h).await;
        assert_eq!(h.store.get().await.unwrap().status, SyncStatus::Completed);

        let resumed: Vec<u64> = h.transport.requests()[before.len()..]
            .iter()
            .flat_map(sent_ids)
            .collect();
        assert_eq!(resumed, (21..=40).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_does_not_mint_a_new_token() {
        let h = harness(55);
        let first = h.orchestrator.start().await.unwrap();
        let token = started_token(&first);

        let second = h.orchestrator.start().await.unwrap();
        assert!(matches!(second, StartOutcome::AlreadyRunning { .. }));
        assert_eq!(second.progress().run_token, Some(token));
        assert_eq!(h.queue.pending().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_run_is_resumed_and_old_chunks_orphaned() {
        let old = RunToken::new("old");
        let h = harness_with(
            (1..=55).map(order).collect(),
            MemoryProgressStore::with_record(SyncProgress {
                status: SyncStatus::InProgress,
                processed_orders: 20,
                total_orders: Some(55),
                cursor: Some(Cursor::new("20")),
                run_token: Some(old.clone()),
                last_updated_at: Some(Utc::now() - TimeDelta::minutes(10)),
                ..SyncProgress::default()
            }),
        );

        let outcome = h.orchestrator.start().await.unwrap();
        let token = started_token(&outcome);
        assert_ne!(token, old);
        assert!(matches!(outcome, StartOutcome::Started { resumed: true, .. }));
        assert_eq!(outcome.progress().cursor, Some(Cursor::new("20")));

        assert_eq!(
            h.orchestrator.run_chunk(&old).await.unwrap(),
            ChunkOutcome::Orphaned
        );

        drain(&h).await;
        let done = h.store.get().await.unwrap();
        assert_eq!(done.status, SyncStatus::Completed);
        assert_eq!(done.processed_orders, 55);
    }

    #[tokio::test(start_paused = true)]
    async fn force_reset_invalidates_the_live_token() {
        let h = harness(55);
        let token = started_token(&h.orchestrator.start().await.unwrap());

        let cleared = h.orchestrator.reset(true).await.unwrap();
        assert_eq!(cleared, SyncProgress::default());
        assert_eq!(h.queue.pending().await.unwrap(), 0);

        assert_eq!(
            h.orchestrator.run_chunk(&token).await.unwrap(),
            ChunkOutcome::Orphaned
        );
        assert_eq!(h.store.get().await.unwrap(), SyncProgress::default());
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_without_force_is_refused_while_running() {
        let h = harness(55);
        h.orchestrator.start().await.unwrap();
        let before = h.store.get().await.unwrap();

        let err = h.orchestrator.reset(false).await.unwrap_err();
        assert!(matches!(err, SyncError::InProgress));
        assert_eq!(h.store.get().await.unwrap(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_without_force_clears_finished_run() {
        let h = harness(3);
        h.orchestrator.start().await.unwrap();
        drain(&h).await;

        let cleared = h.orchestrator.reset(false).await.unwrap();
        assert_eq!(cleared, SyncProgress::default());
    }

    #[tokio::test(start_paused = true)]
    async fn untransformable_orders_are_skipped_not_fatal() {
        let mut orders: Vec<RawOrder> = (1..=5).map(order).collect();
        orders[2].total = "ten dollars".to_string();
        orders[3].status = "trash".to_string();
        let h = harness_with(orders, MemoryProgressStore::new());

        h.orchestrator.start().await.unwrap();
        drain(&h).await;

        let done = h.store.get().await.unwrap();
        assert_eq!(done.status, SyncStatus::Completed);
        assert_eq!(done.processed_orders, 5);
        assert_eq!(done.skipped_orders, 1);

        let body: serde_json::Value =
            serde_json::from_slice(&h.transport.requests()[0].body).unwrap();
        assert_eq!(body["orders"].as_array().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_source_failures_are_retried() {
        let h = harness(5);
        h.source.push_failure(SourceError::network("connection reset"));

        h.orchestrator.start().await.unwrap();
        let outcomes = drain(&h).await;
        assert!(matches!(outcomes.as_slice(), [ChunkOutcome::Completed(_)]));
        assert_eq!(h.source.count_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_count_failure_fails_run_on_start() {
        let h = harness(5);
        h.source.push_failure(SourceError::Unauthorized { status: 401 });

        let outcome = h.orchestrator.start().await.unwrap();
        assert_eq!(outcome.progress().status, SyncStatus::Error);
        assert_eq!(h.source.count_calls(), 1);
        assert_eq!(h.queue.pending().await.unwrap(), 0);

        let failed = h.store.get().await.unwrap();
        assert_eq!(failed.status, SyncStatus::Error);
        assert!(failed.cursor.is_none());
        assert!(failed.run_token.is_none());
        assert!(failed.last_error.unwrap().starts_with("order count failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_fetch_failure_fails_run_without_retry() {
        let h = harness(5);
        h.orchestrator.start().await.unwrap();
        h.source.push_failure(SourceError::Unauthorized { status: 401 });

        let outcomes = drain(&h).await;
        assert!(matches!(outcomes.as_slice(), [ChunkOutcome::Failed(_)]));
        assert_eq!(h.source.list_calls(), 1);

        let failed = h.store.get().await.unwrap();
        assert_eq!(failed.status, SyncStatus::Error);
        assert!(failed.cursor.is_none());
        assert!(failed.last_error.unwrap().starts_with("order fetch failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn error_without_cursor_restarts_from_zero() {
        let h = harness_with(
            (1..=5).map(order).collect(),
            MemoryProgressStore::with_record(SyncProgress {
                status: SyncStatus::Error,
                processed_orders: 0,
                skipped_orders: 2,
                last_error: Some("boom".to_string()),
                ..SyncProgress::default()
            }),
        );

        let outcome = h.orchestrator.start().await.unwrap();
        assert!(matches!(outcome, StartOutcome::Started { resumed: false, .. }));
        assert_eq!(outcome.progress().skipped_orders, 0);
        assert!(outcome.progress().last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn chunk_for_unknown_token_is_a_no_op() {
        let h = harness(5);
        assert_eq!(
            h.orchestrator
                .run_chunk(&RunToken::new("nobody"))
                .await
                .unwrap(),
            ChunkOutcome::Orphaned
        );
        assert_eq!(h.store.get().await.unwrap(), SyncProgress::default());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = SyncOrchestrator::new(
            Arc::new(MemoryProgressStore::new()),
            Arc::new(MemoryOrderSource::default()),
            Arc::new(
                IngestionClient::new_with_transport(
                    &IngestionConfig {
                        endpoint: "https://ingest.example.com".to_string(),
                        site_id: "s".to_string(),
                        api_token: "t".to_string(),
                        timeout: Duration::from_secs(1),
                        retry: RetryConfig::default(),
                    },
                    Arc::new(MockTransport::new()),
                )
                .unwrap(),
            ),
            Arc::new(MemoryChunkQueue::new()),
            SyncConfig {
                batch_size: 0,
                ..SyncConfig::default()
            },
        );
        assert!(matches!(result, Err(SyncError::InvalidConfig { .. })));
    }
}
