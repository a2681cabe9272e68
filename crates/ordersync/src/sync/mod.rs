//! Resumable, token-gated order history sync.
//!
//! # Module Structure
//!
//! - [`types`] - `SyncConfig`, defaults, `StartOutcome` / `ChunkOutcome`
//! - [`orchestrator`] - the state machine: start, resume, chunk, reset
//! - [`gateway`] - JSON-friendly control surface with error payloads
//! - [`worker`] - executes scheduled chunks from the queue
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ordersync::sync::{ChunkWorker, SyncConfig, SyncGateway, SyncOrchestrator};
//!
//! let orchestrator = Arc::new(SyncOrchestrator::new(store, source, ingestor, queue, SyncConfig::default())?);
//! let gateway = SyncGateway::new(orchestrator.clone());
//!
//! let snapshot = gateway.start_sync().await?;
//! println!("{}", serde_json::to_string(&snapshot)?);
//!
//! ChunkWorker::new(orchestrator).run_pending().await?;
//! ```

mod errors;
pub mod gateway;
pub mod orchestrator;
pub mod types;
pub mod worker;

pub use errors::SyncError;
pub use gateway::{ErrorPayload, ProgressSnapshot, SyncGateway};
pub use orchestrator::SyncOrchestrator;
pub use types::{
    ChunkOutcome, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_DELAY, DEFAULT_PAGE_SIZE,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_STALE_AFTER, MAX_PAGE_SIZE, StartOutcome, SyncConfig,
};
pub use worker::{ChunkWorker, DEFAULT_POLL_INTERVAL, DrainStats};
