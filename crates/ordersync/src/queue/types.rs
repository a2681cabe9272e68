use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::RunToken;

use super::errors::{QueueError, Result};

/// One pending chunk execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledChunk {
    pub id: Uuid,
    /// Token the chunk was scheduled under; stale tokens make it a no-op.
    pub run_token: RunToken,
    pub due_at: DateTime<Utc>,
}

/// Durable task queue for sync chunks.
///
/// A chunk is claimed by exactly one `next_due` call. Implementations do not
/// look at tokens: orphaned chunks are filtered out by the orchestrator when
/// they run.
#[async_trait]
pub trait ChunkQueue: Send + Sync {
    /// Enqueue a chunk for `token` that becomes due after `delay`.
    async fn schedule_chunk(&self, token: &RunToken, delay: Duration) -> Result<ScheduledChunk>;

    /// Claim the earliest chunk due at or before `now`, if any.
    async fn next_due(&self, now: DateTime<Utc>) -> Result<Option<ScheduledChunk>>;

    /// Number of chunks waiting, due or not.
    async fn pending(&self) -> Result<u64>;

    /// Drop every pending chunk. Returns how many were removed.
    async fn clear(&self) -> Result<u64>;
}

/// `now + delay`, rejecting delays chrono cannot represent.
pub(crate) fn due_at(now: DateTime<Utc>, delay: Duration) -> Result<DateTime<Utc>> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or(QueueError::InvalidDelay { delay })
}
