//! Sync configuration and outcomes.

use std::time::Duration;

use serde::Serialize;

use crate::retry::{DEFAULT_MAX_ATTEMPTS, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, RetryConfig};
use crate::store::{RunToken, SyncProgress};
use crate::transform::{DEFAULT_COGS_META_KEY, DEFAULT_EXCLUDED_STATUSES, TransformConfig};

use super::errors::SyncError;

/// Orders fetched per chunk.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Events per ingestion request; never below the page size.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// An active run with no progress for this long is reported as stalled.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(300);

/// Timeout applied to every network call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between a chunk finishing and its successor becoming due.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_secs(1);

/// Largest page the WooCommerce API serves.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Attempts at claiming the run token before giving up on contention.
pub(crate) const CLAIM_ATTEMPTS: usize = 3;

/// Tunables of a sync run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub cogs_meta_key: Option<String>,
    pub cogs_default_percentage: Option<f64>,
    pub excluded_statuses: Vec<String>,
    pub page_size: u32,
    pub batch_size: usize,
    pub stale_after: Duration,
    /// Total attempts per network operation, first try included.
    pub max_retries: usize,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
    pub chunk_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cogs_meta_key: Some(DEFAULT_COGS_META_KEY.to_string()),
            cogs_default_percentage: None,
            excluded_statuses: DEFAULT_EXCLUDED_STATUSES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            stale_after: DEFAULT_STALE_AFTER,
            max_retries: DEFAULT_MAX_ATTEMPTS,
            min_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            chunk_delay: DEFAULT_CHUNK_DELAY,
        }
    }
}

impl SyncConfig {
    /// Reject settings the run cannot work with.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(SyncError::invalid_config(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        // A page goes out in one request, so a failed page never has delivered batches.
        if self.batch_size < self.page_size as usize {
            return Err(SyncError::invalid_config(format!(
                "batch_size must be at least page_size ({}), got {}",
                self.page_size, self.batch_size
            )));
        }
        if self.max_retries == 0 {
            return Err(SyncError::invalid_config("max_retries must be at least 1"));
        }
        if self.min_backoff > self.max_backoff {
            return Err(SyncError::invalid_config(
                "min_backoff must not exceed max_backoff",
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(SyncError::invalid_config("request_timeout must be positive"));
        }
        if let Some(pct) = self.cogs_default_percentage
            && !(0.0..=100.0).contains(&pct)
        {
            return Err(SyncError::invalid_config(format!(
                "cogs_default_percentage must be between 0 and 100, got {pct}"
            )));
        }
        Ok(())
    }

    pub fn transform_config(&self) -> TransformConfig {
        TransformConfig {
            cogs_meta_key: self.cogs_meta_key.clone(),
            cogs_default_percentage: self.cogs_default_percentage,
            excluded_statuses: self.excluded_statuses.clone(),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.min_backoff, self.max_backoff, self.max_retries)
    }
}

/// What `start` did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    /// A new run was claimed. Its first chunk is scheduled unless the run
    /// already ended on start: `completed` for an empty store, or `error`
    /// when the orders could not be counted.
    Started {
        progress: SyncProgress,
        #[serde(skip)]
        token: RunToken,
        /// Whether the run continues from a preserved cursor.
        resumed: bool,
    },
    /// A live run exists; nothing changed.
    AlreadyRunning { progress: SyncProgress },
}

impl StartOutcome {
    pub fn progress(&self) -> &SyncProgress {
        match self {
            Self::Started { progress, .. } | Self::AlreadyRunning { progress } => progress,
        }
    }
}

/// What a chunk execution did.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// The token was not live; nothing was written.
    Orphaned,
    /// A page was committed and the next chunk scheduled.
    Advanced(SyncProgress),
    /// The last page was committed.
    Completed(SyncProgress),
    /// The run moved to `error`.
    Failed(SyncProgress),
}

impl ChunkOutcome {
    pub fn progress(&self) -> Option<&SyncProgress> {
        match self {
            Self::Orphaned => None,
            Self::Advanced(p) | Self::Completed(p) | Self::Failed(p) => Some(p),
        }
    }
}
