//! Progress store port and its implementations.
//!
//! The store holds one [`SyncProgress`] record. Ownership of a run is the
//! stored [`RunToken`]: writers holding any other token are rejected by
//! [`ProgressStore::set_for_run`], and new runs are claimed with
//! [`ProgressStore::compare_and_swap_token`].
//!
//! - [`MemoryProgressStore`] - mutex-guarded, process local
//! - [`DatabaseProgressStore`] - one row of the `sync_progress` table

mod database;
mod errors;
mod memory;
mod types;

pub use database::{DEFAULT_RECORD_NAME, DatabaseProgressStore};
pub use errors::{Result, StoreError};
pub use memory::MemoryProgressStore;
pub use types::{ProgressPatch, ProgressStore, RunToken, SyncProgress};
