//! SeaORM entity definitions for the ordersync database schema.

pub mod prelude;
pub mod scheduled_chunk;
pub mod sync_progress;
pub mod sync_status;
