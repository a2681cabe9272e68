//! Common re-exports for convenient entity usage.

pub use super::scheduled_chunk::{
    ActiveModel as ScheduledChunkActiveModel, Column as ScheduledChunkColumn,
    Entity as ScheduledChunk, Model as ScheduledChunkModel,
};
pub use super::sync_progress::{
    ActiveModel as SyncProgressActiveModel, Column as SyncProgressColumn,
    Entity as SyncProgressRecord, Model as SyncProgressModel,
};
pub use super::sync_status::SyncStatus;
