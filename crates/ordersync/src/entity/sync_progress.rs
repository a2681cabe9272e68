//! SyncProgress entity - the single durable record driving a history sync.
//!
//! One row exists per record name. The orchestrator only ever touches the row
//! it was configured with, so several independent stores can share a database.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::sync_status::SyncStatus;

/// Persisted sync progress row.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_progress")]
pub struct Model {
    /// Record name (e.g. "order_history").
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,

    /// Persisted status. Never `stalled`.
    pub status: SyncStatus,

    // ─── Counters ────────────────────────────────────────────────────────────
    /// Orders walked in the current/last run.
    pub processed_orders: i64,
    /// Orders skipped because they could not be transformed.
    pub skipped_orders: i64,
    /// Estimated total, NULL while unknown.
    pub total_orders: Option<i64>,

    // ─── Run Ownership ───────────────────────────────────────────────────────
    /// Opaque resume pointer into the order source.
    #[sea_orm(column_type = "Text", nullable)]
    pub cursor: Option<String>,
    /// Token of the live run, NULL when no run is active.
    pub run_token: Option<String>,

    // ─── Timestamps ──────────────────────────────────────────────────────────
    pub started_at: Option<DateTimeWithTimeZone>,
    pub last_updated_at: Option<DateTimeWithTimeZone>,
    pub last_synced_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
