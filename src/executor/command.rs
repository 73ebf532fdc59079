use super::collaborators::MigrationCapability;
use crate::balancer::{HostId, WorkloadId};
use crate::db::Database;
use crate::error::{MigrationErrorKind, MigrationFailure};
use async_trait::async_trait;
use regex::Regex;
use std::process::Stdio;
use std::sync::{Arc, LazyLock};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Patterns in the migration helper's stderr, checked in order.
static FAILURE_PATTERNS: LazyLock<Vec<(Regex, MigrationErrorKind)>> = LazyLock::new(|| {
    [
        (
            r"(?i)insufficient|not enough|no capacity|resource(s)? unavailable|out of memory",
            MigrationErrorKind::ResourceUnavailable,
        ),
        (
            r"(?i)another (operation|job|migration)|already in progress|locked by|concurrent",
            MigrationErrorKind::ConcurrentOperation,
        ),
        (r"(?i)timed?[ -]?out", MigrationErrorKind::OperationTimedOut),
    ]
    .into_iter()
    .filter_map(|(pattern, kind)| Regex::new(pattern).ok().map(|re| (re, kind)))
    .collect()
});

/// Classify a failed migration from the helper's error output.
pub(crate) fn classify_failure(stderr: &str) -> MigrationErrorKind {
    FAILURE_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(stderr))
        .map_or(MigrationErrorKind::Other, |(_, kind)| *kind)
}

/// Migrates by running an external helper:
/// `<command> <workload_id> <destination_host_id> <live|storage>`.
///
/// A zero exit status means the workload now runs on the destination, which
/// is then recorded in the inventory so the next snapshot reflects it.
pub(crate) struct CommandMigrator {
    command: String,
    db: Arc<Database>,
}

impl CommandMigrator {
    pub(crate) fn new(command: impl Into<String>, db: Arc<Database>) -> Self {
        Self { command: command.into(), db }
    }
}

#[async_trait]
impl MigrationCapability for CommandMigrator {
    async fn migrate(
        &self,
        workload_id: WorkloadId,
        destination_host_id: HostId,
        requires_storage_motion: bool,
    ) -> Result<(), MigrationFailure> {
        let mode = if requires_storage_motion { "storage" } else { "live" };
        debug!("Running {} {} {} {}", self.command, workload_id, destination_host_id, mode);

        let output = Command::new(&self.command)
            .arg(workload_id.to_string())
            .arg(destination_host_id.to_string())
            .arg(mode)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                MigrationFailure::new(
                    MigrationErrorKind::Other,
                    workload_id,
                    destination_host_id,
                    format!("failed to run {}: {e}", self.command),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim();
            let message = if message.is_empty() {
                format!("migration helper exited with {}", output.status)
            } else {
                message.to_string()
            };
            return Err(MigrationFailure::new(
                classify_failure(&message),
                workload_id,
                destination_host_id,
                message,
            ));
        }

        info!("Workload {} migrated to host {}", workload_id, destination_host_id);

        // The move already happened; an inventory write failure must not turn
        // it into a failed migration.
        if let Err(e) = self.db.reassign_workload(workload_id, destination_host_id) {
            warn!(
                "Workload {} migrated but inventory update failed: {:#}",
                workload_id, e
            );
        }

        Ok(())
    }
}
