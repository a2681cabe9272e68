use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use uuid::Uuid;

use crate::entity::scheduled_chunk::{ActiveModel, Column, Entity as ScheduledChunkEntity, Model};
use crate::store::RunToken;

use super::errors::Result;
use super::types::{ChunkQueue, ScheduledChunk, due_at};

/// Attempts at claiming a due chunk before reporting none, when other
/// workers keep winning the race.
const CLAIM_ATTEMPTS: usize = 3;

/// Chunk queue backed by the `scheduled_chunks` table.
///
/// Claiming deletes the row; only the worker whose delete affected it runs
/// the chunk.
#[derive(Debug, Clone)]
pub struct DatabaseChunkQueue {
    db: Arc<DatabaseConnection>,
    record_name: String,
}

impl DatabaseChunkQueue {
    pub fn new(db: Arc<DatabaseConnection>, record_name: impl Into<String>) -> Self {
        Self {
            db,
            record_name: record_name.into(),
        }
    }
}

fn from_model(model: Model) -> ScheduledChunk {
    ScheduledChunk {
        id: model.id,
        run_token: RunToken::new(model.run_token),
        due_at: model.due_at.with_timezone(&Utc),
    }
}

#[async_trait]
impl ChunkQueue for DatabaseChunkQueue {
    async fn schedule_chunk(&self, token: &RunToken, delay: Duration) -> Result<ScheduledChunk> {
        let now = Utc::now();
        let chunk = ScheduledChunk {
            id: Uuid::new_v4(),
            run_token: token.clone(),
            due_at: due_at(now, delay)?,
        };

        ScheduledChunkEntity::insert(ActiveModel {
            id: Set(chunk.id),
            record_name: Set(self.record_name.clone()),
            run_token: Set(token.as_str().to_string()),
            due_at: Set(chunk.due_at.fixed_offset()),
            created_at: Set(now.fixed_offset()),
        })
        .exec_without_returning(self.db.as_ref())
        .await?;

        tracing::debug!(
            record = %self.record_name,
            chunk = %chunk.id,
            due_at = %chunk.due_at,
            "Scheduled chunk"
        );
        Ok(chunk)
    }

    async fn next_due(&self, now: DateTime<Utc>) -> Result<Option<ScheduledChunk>> {
        for _ in 0..CLAIM_ATTEMPTS {
            let Some(model) = ScheduledChunkEntity::find()
                .filter(Column::RecordName.eq(self.record_name.as_str()))
                .filter(Column::DueAt.lte(now.fixed_offset()))
                .order_by_asc(Column::DueAt)
                .one(self.db.as_ref())
                .await?
            else {
                return Ok(None);
            };

            let deleted = ScheduledChunkEntity::delete_by_id(model.id)
                .exec(self.db.as_ref())
                .await?;
            if deleted.rows_affected == 1 {
                return Ok(Some(from_model(model)));
            }

            tracing::debug!(chunk = %model.id, "Chunk claimed by another worker");
        }

        Ok(None)
    }

    async fn pending(&self) -> Result<u64> {
        let count = ScheduledChunkEntity::find()
            .filter(Column::RecordName.eq(self.record_name.as_str()))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }

    async fn clear(&self) -> Result<u64> {
        let result = ScheduledChunkEntity::delete_many()
            .filter(Column::RecordName.eq(self.record_name.as_str()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}
