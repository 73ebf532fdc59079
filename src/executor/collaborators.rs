use super::report::{DrsRunReport, MoveRecord};
use crate::balancer::{ClusterId, ClusterSnapshot, HostId, WorkloadId};
use crate::config::ClusterDrsConfig;
use crate::error::{DrsError, MigrationFailure};
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Source of cluster inventory and per-cluster DRS configuration.
pub(crate) trait SnapshotProvider: Send + Sync {
    /// `ConfigNotFound` when the cluster has no DRS config.
    fn cluster_config(&self, cluster_id: ClusterId) -> Result<ClusterDrsConfig, DrsError>;

    /// `ClusterNotFound` or `SnapshotUnavailable` when inventory cannot be read.
    fn cluster_snapshot(&self, cluster_id: ClusterId) -> Result<ClusterSnapshot, DrsError>;

    /// Clusters that have a DRS config, enabled or not.
    fn drs_clusters(&self) -> Result<Vec<ClusterId>, DrsError>;
}

/// Performs one live migration and waits for its result.
#[async_trait]
pub(crate) trait MigrationCapability: Send + Sync {
    async fn migrate(
        &self,
        workload_id: WorkloadId,
        destination_host_id: HostId,
        requires_storage_motion: bool,
    ) -> Result<(), MigrationFailure>;
}

/// Persists run reports as they progress.
pub(crate) trait RunLog: Send + Sync {
    /// Insert or update the run and all of its move records.
    fn save_run(&self, report: &DrsRunReport) -> Result<()>;

    /// Insert or update a single move record.
    fn save_move(&self, run_id: Uuid, record: &MoveRecord) -> Result<()>;

    /// The cluster's latest run that was persisted but never finished.
    fn unfinished_run(&self, cluster_id: ClusterId) -> Result<Option<DrsRunReport>>;
}
