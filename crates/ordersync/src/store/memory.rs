use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::errors::Result;
use super::types::{ProgressPatch, ProgressStore, RunToken, SyncProgress};

/// Process-local progress store guarded by a mutex.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    record: Mutex<SyncProgress>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing record.
    pub fn with_record(record: SyncProgress) -> Self {
        Self {
            record: Mutex::new(record),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncProgress> {
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn get(&self) -> Result<SyncProgress> {
        Ok(self.lock().clone())
    }

    async fn set(&self, patch: ProgressPatch) -> Result<SyncProgress> {
        let mut record = self.lock();
        record.apply(&patch);
        Ok(record.clone())
    }

    async fn set_for_run(
        &self,
        token: &RunToken,
        patch: ProgressPatch,
    ) -> Result<Option<SyncProgress>> {
        let mut record = self.lock();
        if !record.is_live(token) {
            return Ok(None);
        }
        record.apply(&patch);
        Ok(Some(record.clone()))
    }

    async fn compare_and_swap_token(
        &self,
        expected: Option<&RunToken>,
        new: Option<&RunToken>,
        patch: ProgressPatch,
    ) -> Result<bool> {
        let mut record = self.lock();
        if record.run_token.as_ref() != expected {
            return Ok(false);
        }
        record.apply(&patch.run_token(new.cloned()));
        Ok(true)
    }
}
