//! Status enum for the order history sync state machine.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a sync run.
///
/// `Stalled` is never persisted. It is computed when a run that claims to be
/// active has not reported progress within the staleness threshold.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[sea_orm(string_value = "idle")]
    #[default]
    Idle,
    #[sea_orm(string_value = "starting")]
    Starting,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "stalled")]
    Stalled,
    #[sea_orm(string_value = "error")]
    Error,
}

impl SyncStatus {
    /// Whether a run in this status may still execute chunks.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::InProgress)
    }

    /// Whether a poller can stop polling.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Idle | Self::Completed | Self::Error | Self::Stalled)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Stalled => "stalled",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
