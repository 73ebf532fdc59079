use std::sync::Arc;

use crate::config::AppConfig;
use crate::coordinator::DrsScheduleCoordinator;
use crate::db::Database;
use crate::events::EventHub;
use crate::executor::{CommandMigrator, DrsExecutor, MigrationCapability, RunLog, SnapshotProvider};

/// Shared application state passed to all API handlers via axum's State extractor.
pub(crate) struct AppState {
    pub db: Arc<Database>,
    pub config: AppConfig,
    pub event_hub: EventHub,
    pub coordinator: Arc<DrsScheduleCoordinator>,
}

impl AppState {
    /// Wire the executor and coordinator around `db`, migrating through the
    /// configured helper command.
    pub(crate) fn new(db: Arc<Database>, config: AppConfig, event_hub: EventHub) -> Self {
        let migrator =
            Arc::new(CommandMigrator::new(config.migrate_command.clone(), Arc::clone(&db)));
        Self::with_migrator(db, config, event_hub, migrator)
    }

    pub(crate) fn with_migrator(
        db: Arc<Database>,
        config: AppConfig,
        event_hub: EventHub,
        migrator: Arc<dyn MigrationCapability>,
    ) -> Self {
        let executor = Arc::new(DrsExecutor::new(
            Arc::clone(&db) as Arc<dyn SnapshotProvider>,
            migrator,
            Arc::clone(&db) as Arc<dyn RunLog>,
            event_hub.clone(),
            config.migration_timeout(),
        ));
        let coordinator = Arc::new(DrsScheduleCoordinator::new(executor, config.tick_interval()));
        Self { db, config, event_hub, coordinator }
    }
}
