use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelBehavior, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, sea_query::OnConflict,
};

use crate::entity::sync_progress::{ActiveModel, Column, Entity as SyncProgressRecord, Model};
use crate::entity::sync_status::SyncStatus;
use crate::source::Cursor;

use super::errors::{Result, StoreError};
use super::types::{ProgressPatch, ProgressStore, RunToken, SyncProgress};

/// Default record name of the order history sync.
pub const DEFAULT_RECORD_NAME: &str = "order_history";

/// Progress store backed by the `sync_progress` table.
///
/// Each instance owns one row, keyed by record name. Token-gated writes are
/// single `UPDATE ... WHERE run_token = ?` statements, so the check and the
/// write cannot be separated by another writer.
#[derive(Debug, Clone)]
pub struct DatabaseProgressStore {
    db: Arc<DatabaseConnection>,
    name: String,
}

impl DatabaseProgressStore {
    pub fn new(db: Arc<DatabaseConnection>, name: impl Into<String>) -> Self {
        Self {
            db,
            name: name.into(),
        }
    }

    /// Record name this store reads and writes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert the idle row if it does not exist yet.
    async fn ensure_row(&self) -> Result<()> {
        let row = ActiveModel {
            name: Set(self.name.clone()),
            status: Set(SyncStatus::Idle),
            processed_orders: Set(0),
            skipped_orders: Set(0),
            total_orders: Set(None),
            cursor: Set(None),
            run_token: Set(None),
            started_at: Set(None),
            last_updated_at: Set(None),
            last_synced_at: Set(None),
            last_error: Set(None),
        };

        let result = SyncProgressRecord::insert(row)
            .on_conflict(OnConflict::column(Column::Name).do_nothing().to_owned())
            .exec_without_returning(self.db.as_ref())
            .await;

        match result {
            Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load(&self) -> Result<SyncProgress> {
        match SyncProgressRecord::find_by_id(self.name.clone())
            .one(self.db.as_ref())
            .await?
        {
            Some(model) => from_model(model),
            None => Ok(SyncProgress::default()),
        }
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn to_fixed(at: Option<DateTime<Utc>>) -> Option<sea_orm::prelude::DateTimeWithTimeZone> {
    at.map(|t| t.fixed_offset())
}

fn counter(name: &str, field: &str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| StoreError::corrupt(name, format!("negative {field}: {value}")))
}

fn from_model(model: Model) -> Result<SyncProgress> {
    let processed_orders = counter(&model.name, "processed_orders", model.processed_orders)?;
    let skipped_orders = counter(&model.name, "skipped_orders", model.skipped_orders)?;
    let total_orders = model
        .total_orders
        .map(|t| counter(&model.name, "total_orders", t))
        .transpose()?;

    if model.status == SyncStatus::Stalled {
        return Err(StoreError::corrupt(&model.name, "persisted status is stalled"));
    }

    Ok(SyncProgress {
        status: model.status,
        processed_orders,
        skipped_orders,
        total_orders,
        cursor: model.cursor.map(Cursor::new),
        run_token: model.run_token.map(RunToken::new),
        started_at: model.started_at.map(|t| t.with_timezone(&Utc)),
        last_updated_at: model.last_updated_at.map(|t| t.with_timezone(&Utc)),
        last_synced_at: model.last_synced_at.map(|t| t.with_timezone(&Utc)),
        last_error: model.last_error,
    })
}

/// Active model carrying only the fields the patch sets.
fn to_active_model(patch: &ProgressPatch) -> ActiveModel {
    let mut model = <ActiveModel as ActiveModelBehavior>::new();

    if let Some(status) = patch.status {
        model.status = Set(status);
    }
    if let Some(n) = patch.processed_orders {
        model.processed_orders = Set(to_i64(n));
    }
    if let Some(n) = patch.skipped_orders {
        model.skipped_orders = Set(to_i64(n));
    }
    if let Some(total) = patch.total_orders {
        model.total_orders = Set(total.map(to_i64));
    }
    if let Some(cursor) = &patch.cursor {
        model.cursor = Set(cursor.as_ref().map(|c| c.as_str().to_string()));
    }
    if let Some(token) = &patch.run_token {
        model.run_token = Set(token.as_ref().map(|t| t.as_str().to_string()));
    }
    if let Some(at) = patch.started_at {
        model.started_at = Set(to_fixed(at));
    }
    if let Some(at) = patch.last_updated_at {
        model.last_updated_at = Set(to_fixed(at));
    }
    if let Some(at) = patch.last_synced_at {
        model.last_synced_at = Set(to_fixed(at));
    }
    if let Some(error) = &patch.last_error {
        model.last_error = Set(error.clone());
    }

    model
}

#[async_trait]
impl ProgressStore for DatabaseProgressStore {
    async fn get(&self) -> Result<SyncProgress> {
        self.load().await
    }

    async fn set(&self, patch: ProgressPatch) -> Result<SyncProgress> {
        if patch.is_empty() {
            return self.load().await;
        }
        self.ensure_row().await?;

        SyncProgressRecord::update_many()
            .set(to_active_model(&patch))
            .filter(Column::Name.eq(self.name.as_str()))
            .exec(self.db.as_ref())
            .await?;

        self.load().await
    }

    async fn set_for_run(
        &self,
        token: &RunToken,
        patch: ProgressPatch,
    ) -> Result<Option<SyncProgress>> {
        if patch.is_empty() {
            let record = self.load().await?;
            return Ok(record.is_live(token).then_some(record));
        }

        let result = SyncProgressRecord::update_many()
            .set(to_active_model(&patch))
            .filter(Column::Name.eq(self.name.as_str()))
            .filter(Column::RunToken.eq(token.as_str()))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.load().await.map(Some)
    }

    async fn compare_and_swap_token(
        &self,
        expected: Option<&RunToken>,
        new: Option<&RunToken>,
        patch: ProgressPatch,
    ) -> Result<bool> {
        self.ensure_row().await?;

        let patch = patch.run_token(new.cloned());
        let token_matches = match expected {
            Some(token) => Column::RunToken.eq(token.as_str()),
            None => Column::RunToken.is_null(),
        };

        let result = SyncProgressRecord::update_many()
            .set(to_active_model(&patch))
            .filter(Column::Name.eq(self.name.as_str()))
            .filter(token_matches)
            .exec(self.db.as_ref())
            .await?;

        tracing::debug!(
            record = %self.name,
            expected = expected.map(RunToken::as_str),
            claimed = result.rows_affected == 1,
            "Run token compare-and-swap"
        );

        Ok(result.rows_affected == 1)
    }
}
