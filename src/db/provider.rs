use super::Database;
use crate::balancer::{ClusterId, ClusterSnapshot};
use crate::config::ClusterDrsConfig;
use crate::error::DrsError;
use crate::executor::{DrsRunReport, MoveRecord, RunLog, SnapshotProvider};
use anyhow::Result;
use uuid::Uuid;

impl SnapshotProvider for Database {
    fn cluster_config(&self, cluster_id: ClusterId) -> Result<ClusterDrsConfig, DrsError> {
        match self.get_drs_config(cluster_id) {
            Ok(Some(config)) => Ok(config),
            Ok(None) => Err(DrsError::ConfigNotFound(cluster_id)),
            Err(e) => Err(DrsError::snapshot_unavailable(cluster_id, format!("{e:#}"))),
        }
    }

    fn cluster_snapshot(&self, cluster_id: ClusterId) -> Result<ClusterSnapshot, DrsError> {
        self.load_snapshot(cluster_id)
    }

    fn drs_clusters(&self) -> Result<Vec<ClusterId>, DrsError> {
        self.drs_cluster_ids().map_err(|e| DrsError::Storage(format!("{e:#}")))
    }
}

impl RunLog for Database {
    fn save_run(&self, report: &DrsRunReport) -> Result<()> {
        Self::save_run(self, report)
    }

    fn save_move(&self, run_id: Uuid, record: &MoveRecord) -> Result<()> {
        Self::save_move(self, run_id, record)
    }

    fn unfinished_run(&self, cluster_id: ClusterId) -> Result<Option<DrsRunReport>> {
        Self::unfinished_run(self, cluster_id)
    }
}
