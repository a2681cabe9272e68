//! ScheduledChunk entity - durable queue of pending chunk executions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A chunk waiting to be executed by a worker.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "scheduled_chunks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Progress record this chunk belongs to.
    pub record_name: String,

    /// Run token the chunk was scheduled under.
    pub run_token: String,

    /// Earliest time the chunk may run.
    pub due_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
