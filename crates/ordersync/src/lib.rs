//! Ordersync - resumable historical order sync into an analytics ingestion service.
//!
//! This library walks a store's complete order history page by page,
//! normalizes each order and delivers the results in batches to a remote
//! ingestion endpoint. Runs are token gated: at most one run owns the
//! progress record at a time, interrupted runs resume from their cursor and
//! late chunks of a superseded run are dropped.
//!
//! # Features
//!
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to automatically run migrations on connection.
//! - `http` - The reqwest transport, WooCommerce source and ingestion client
//!   constructors that open real connections.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ordersync::connect_and_migrate;
//! use ordersync::queue::DatabaseChunkQueue;
//! use ordersync::store::{DEFAULT_RECORD_NAME, DatabaseProgressStore};
//! use ordersync::sync::{ChunkWorker, SyncConfig, SyncGateway, SyncOrchestrator};
//!
//! let db = Arc::new(connect_and_migrate("sqlite://ordersync.db?mode=rwc").await?);
//! let store = Arc::new(DatabaseProgressStore::new(Arc::clone(&db), DEFAULT_RECORD_NAME));
//! let queue = Arc::new(DatabaseChunkQueue::new(db, DEFAULT_RECORD_NAME));
//!
//! let orchestrator = Arc::new(SyncOrchestrator::new(store, source, ingestor, queue, SyncConfig::default())?);
//! SyncGateway::new(orchestrator.clone()).start_sync().await?;
//! ChunkWorker::new(orchestrator).run_pending().await?;
//! ```

pub mod db;
pub mod entity;
pub mod http;
pub mod ingest;
pub mod queue;
pub mod retry;
pub mod source;
pub mod store;
pub mod sync;
pub mod transform;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
