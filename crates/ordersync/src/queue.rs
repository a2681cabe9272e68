//! Durable scheduling of sync chunks.
//!
//! A run advances one chunk at a time: each chunk schedules its successor
//! before it returns. Workers poll [`ChunkQueue::next_due`] and hand the
//! claimed chunk to the orchestrator.

mod database;
mod errors;
mod memory;
mod types;

pub use database::DatabaseChunkQueue;
pub use errors::{QueueError, Result};
pub use memory::MemoryChunkQueue;
pub use types::{ChunkQueue, ScheduledChunk};
