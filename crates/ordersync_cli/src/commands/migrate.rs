//! `migrate`: manage the `sync_progress` and `scheduled_chunks` tables.
//!
//! Other commands migrate on connect; this exists for inspecting the schema
//! and for rolling it back.

use ordersync::db;
use ordersync::migration::{ConnectionTrait, DbErr, Migrator, MigratorTrait};
use serde::Serialize;

use crate::MigrateAction;
use crate::commands::shared::print_json;

#[derive(Debug, Serialize)]
struct MigrationState {
    name: String,
    applied: bool,
}

/// Applied migrations first, then pending ones, each in declaration order.
async fn migration_states<C: ConnectionTrait>(db: &C) -> Result<Vec<MigrationState>, DbErr> {
    let mut states = Vec::new();
    for migration in Migrator::get_applied_migrations(db).await? {
        states.push(MigrationState {
            name: migration.name().to_string(),
            applied: true,
        });
    }
    for migration in Migrator::get_pending_migrations(db).await? {
        states.push(MigrationState {
            name: migration.name().to_string(),
            applied: false,
        });
    }
    Ok(states)
}

pub(crate) async fn handle_migrate(
    action: MigrateAction,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = db::connect(database_url).await?;

    match action {
        MigrateAction::Up => {
            let pending = Migrator::get_pending_migrations(&db).await?;
            if pending.is_empty() {
                tracing::info!("Sync schema is up to date");
                return Ok(());
            }
            Migrator::up(&db, None).await?;
            for migration in &pending {
                tracing::info!(migration = migration.name(), "Applied");
            }
        }
        MigrateAction::Down => {
            Migrator::down(&db, Some(1)).await?;
            tracing::warn!("Rolled back the last migration; sync progress and queued chunks are gone");
        }
        MigrateAction::Status => {
            print_json(&migration_states(&db).await?)?;
        }
        MigrateAction::Fresh => {
            Migrator::fresh(&db).await?;
            tracing::warn!("Sync tables recreated; progress starts from idle");
        }
    }

    Ok(())
}
