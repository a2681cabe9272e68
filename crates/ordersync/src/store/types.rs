use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::sync_status::SyncStatus;
use crate::source::Cursor;

use super::errors::Result;

/// Opaque identifier of one sync run.
///
/// Whoever holds the token stored in the progress record owns the run; every
/// other holder is orphaned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunToken(String);

impl RunToken {
    /// Mint a fresh random token.
    #[must_use]
    pub fn mint() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The durable sync record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncProgress {
    pub status: SyncStatus,
    pub processed_orders: u64,
    pub skipped_orders: u64,
    pub total_orders: Option<u64>,
    pub cursor: Option<Cursor>,
    pub run_token: Option<RunToken>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SyncProgress {
    /// Whether `token` is the token of the live run.
    #[inline]
    pub fn is_live(&self, token: &RunToken) -> bool {
        self.run_token.as_ref() == Some(token)
    }

    /// An active run whose last progress write is older than `stale_after`.
    ///
    /// An active record without any progress timestamp counts as stale. A
    /// timestamp in the future (clock skew) does not.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        if !self.status.is_active() {
            return false;
        }
        match self.last_updated_at {
            None => true,
            Some(updated) => (now - updated)
                .to_std()
                .is_ok_and(|age| age > stale_after),
        }
    }

    /// The status a caller should see: `Stalled` replaces a stale active status.
    pub fn observed_status(&self, now: DateTime<Utc>, stale_after: Duration) -> SyncStatus {
        if self.is_stale(now, stale_after) {
            SyncStatus::Stalled
        } else {
            self.status
        }
    }

    /// Progress through the known total, clamped to 0-100.
    pub fn percent_complete(&self) -> Option<f64> {
        match self.total_orders {
            Some(total) if total > 0 => {
                let pct = self.processed_orders as f64 * 100.0 / total as f64;
                Some((pct.min(100.0) * 10.0).round() / 10.0)
            }
            _ => None,
        }
    }

    /// Apply every field the patch sets.
    pub fn apply(&mut self, patch: &ProgressPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(n) = patch.processed_orders {
            self.processed_orders = n;
        }
        if let Some(n) = patch.skipped_orders {
            self.skipped_orders = n;
        }
        if let Some(total) = patch.total_orders {
            self.total_orders = total;
        }
        if let Some(cursor) = &patch.cursor {
            self.cursor.clone_from(cursor);
        }
        if let Some(token) = &patch.run_token {
            self.run_token.clone_from(token);
        }
        if let Some(at) = patch.started_at {
            self.started_at = at;
        }
        if let Some(at) = patch.last_updated_at {
            self.last_updated_at = at;
        }
        if let Some(at) = patch.last_synced_at {
            self.last_synced_at = at;
        }
        if let Some(error) = &patch.last_error {
            self.last_error.clone_from(error);
        }
    }
}

/// A partial update of [`SyncProgress`].
///
/// `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressPatch {
    pub status: Option<SyncStatus>,
    pub processed_orders: Option<u64>,
    pub skipped_orders: Option<u64>,
    pub total_orders: Option<Option<u64>>,
    pub cursor: Option<Option<Cursor>>,
    pub run_token: Option<Option<RunToken>>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub last_updated_at: Option<Option<DateTime<Utc>>>,
    pub last_synced_at: Option<Option<DateTime<Utc>>>,
    pub last_error: Option<Option<String>>,
}

impl ProgressPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch restoring every field to its initial value.
    #[must_use]
    pub fn cleared() -> Self {
        Self {
            status: Some(SyncStatus::Idle),
            processed_orders: Some(0),
            skipped_orders: Some(0),
            total_orders: Some(None),
            cursor: Some(None),
            run_token: Some(None),
            started_at: Some(None),
            last_updated_at: Some(None),
            last_synced_at: Some(None),
            last_error: Some(None),
        }
    }

    #[must_use]
    pub fn status(mut self, status: SyncStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn processed(mut self, n: u64) -> Self {
        self.processed_orders = Some(n);
        self
    }

    #[must_use]
    pub fn skipped(mut self, n: u64) -> Self {
        self.skipped_orders = Some(n);
        self
    }

    #[must_use]
    pub fn total(mut self, total: Option<u64>) -> Self {
        self.total_orders = Some(total);
        self
    }

    #[must_use]
    pub fn cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = Some(cursor);
        self
    }

    #[must_use]
    pub fn run_token(mut self, token: Option<RunToken>) -> Self {
        self.run_token = Some(token);
        self
    }

    #[must_use]
    pub fn started_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.started_at = Some(at);
        self
    }

    /// Stamp `last_updated_at`.
    #[must_use]
    pub fn touched(mut self, now: DateTime<Utc>) -> Self {
        self.last_updated_at = Some(Some(now));
        self
    }

    #[must_use]
    pub fn synced_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.last_synced_at = Some(at);
        self
    }

    #[must_use]
    pub fn last_error(mut self, error: Option<String>) -> Self {
        self.last_error = Some(error);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Durable storage for the single sync record.
///
/// `set` is unconditional. `set_for_run` and `compare_and_swap_token` are the
/// token-gated writes that keep two runs from interleaving: implementations
/// must make the token check and the write one atomic step.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Current record; a never-written store reads as the default `idle` record.
    async fn get(&self) -> Result<SyncProgress>;

    /// Apply `patch` unconditionally and return the new record.
    async fn set(&self, patch: ProgressPatch) -> Result<SyncProgress>;

    /// Apply `patch` only if `token` is the stored run token.
    ///
    /// Returns `None` (and writes nothing) when the token is not live.
    async fn set_for_run(&self, token: &RunToken, patch: ProgressPatch)
    -> Result<Option<SyncProgress>>;

    /// Replace the stored token `expected` with `new` and apply `patch`,
    /// atomically. Returns `false` when the stored token is not `expected`.
    async fn compare_and_swap_token(
        &self,
        expected: Option<&RunToken>,
        new: Option<&RunToken>,
        patch: ProgressPatch,
    ) -> Result<bool>;
}
