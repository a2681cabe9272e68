use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::store::RunToken;

use super::errors::Result;
use super::types::{ChunkQueue, ScheduledChunk, due_at};

/// Process-local chunk queue.
#[derive(Debug, Default)]
pub struct MemoryChunkQueue {
    chunks: Mutex<Vec<ScheduledChunk>>,
}

impl MemoryChunkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the pending chunks in scheduling order.
    pub fn snapshot(&self) -> Vec<ScheduledChunk> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ScheduledChunk>> {
        self.chunks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ChunkQueue for MemoryChunkQueue {
    async fn schedule_chunk(&self, token: &RunToken, delay: Duration) -> Result<ScheduledChunk> {
        let chunk = ScheduledChunk {
            id: Uuid::new_v4(),
            run_token: token.clone(),
            due_at: due_at(Utc::now(), delay)?,
        };
        self.lock().push(chunk.clone());
        Ok(chunk)
    }

    async fn next_due(&self, now: DateTime<Utc>) -> Result<Option<ScheduledChunk>> {
        let mut chunks = self.lock();
        let earliest = chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.due_at <= now)
            .min_by_key(|(_, c)| c.due_at)
            .map(|(i, _)| i);
        Ok(earliest.map(|i| chunks.remove(i)))
    }

    async fn pending(&self) -> Result<u64> {
        Ok(self.lock().len() as u64)
    }

    async fn clear(&self) -> Result<u64> {
        let mut chunks = self.lock();
        let removed = chunks.len() as u64;
        chunks.clear();
        Ok(removed)
    }
}
