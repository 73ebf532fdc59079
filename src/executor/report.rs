use crate::balancer::{
    ClusterId, HostId, ImbalanceReading, PlannedMove, ScoreTriple, StopReason, WorkloadId,
};
use crate::error::MigrationErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Final state of a DRS run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RunOutcome {
    /// Still executing (only ever persisted, never returned).
    Running,
    /// DRS is disabled for the cluster.
    Skipped,
    /// Imbalance is within the threshold.
    NoActionNeeded,
    /// Imbalance could not be evaluated (e.g. all-zero utilization).
    CannotEvaluate,
    /// Imbalance detected but no move improves it.
    NoImprovement,
    Completed,
    PartiallyFailed,
    Cancelled,
    /// Aborted before planning by a configuration or snapshot error.
    Failed,
}

impl RunOutcome {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Skipped => "skipped",
            Self::NoActionNeeded => "no_action_needed",
            Self::CannotEvaluate => "cannot_evaluate",
            Self::NoImprovement => "no_improvement",
            Self::Completed => "completed",
            Self::PartiallyFailed => "partially_failed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RunOutcome {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "running" => Ok(Self::Running),
            "skipped" => Ok(Self::Skipped),
            "no_action_needed" => Ok(Self::NoActionNeeded),
            "cannot_evaluate" => Ok(Self::CannotEvaluate),
            "no_improvement" => Ok(Self::NoImprovement),
            "completed" => Ok(Self::Completed),
            "partially_failed" => Ok(Self::PartiallyFailed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid run outcome: {s}")),
        }
    }
}

/// Status of a single move within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum MoveStatus {
    Pending,
    Succeeded,
    Failed,
    Skipped,
}

impl MoveStatus {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for MoveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MoveStatus {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("invalid move status: {s}")),
        }
    }
}

pub(crate) const SKIPPED_PRIOR_FAILURE: &str = "skipped due to prior failure";
pub(crate) const SKIPPED_CANCELLED: &str = "skipped, run cancelled";
pub(crate) const SKIPPED_ABORTED: &str = "skipped, run aborted";

/// One planned move and what happened to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct MoveRecord {
    /// 1-based position in planning order.
    pub order: u32,
    pub workload_id: WorkloadId,
    pub source_host_id: HostId,
    pub destination_host_id: HostId,
    pub requires_storage_motion: bool,
    pub score: ScoreTriple,
    pub status: MoveStatus,
    pub error_kind: Option<MigrationErrorKind>,
    pub detail: Option<String>,
}

impl MoveRecord {
    pub(crate) fn pending(order: u32, planned: &PlannedMove) -> Self {
        Self {
            order,
            workload_id: planned.candidate.workload_id,
            source_host_id: planned.candidate.source_host_id,
            destination_host_id: planned.candidate.destination_host_id,
            requires_storage_motion: planned.candidate.requires_storage_motion,
            score: planned.score,
            status: MoveStatus::Pending,
            error_kind: None,
            detail: None,
        }
    }
}

/// The unit of observability for one DRS run on one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DrsRunReport {
    pub run_id: Uuid,
    pub cluster_id: ClusterId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: RunOutcome,
    pub imbalance_detected: bool,
    pub algorithm: Option<String>,
    pub initial_imbalance: Option<f64>,
    pub projected_imbalance: Option<f64>,
    pub stop_reason: Option<StopReason>,
    pub moves: Vec<MoveRecord>,
    pub detail: Option<String>,
}

impl DrsRunReport {
    pub(crate) fn start(cluster_id: ClusterId) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            cluster_id,
            started_at: Utc::now(),
            finished_at: None,
            outcome: RunOutcome::Running,
            imbalance_detected: false,
            algorithm: None,
            initial_imbalance: None,
            projected_imbalance: None,
            stop_reason: None,
            moves: Vec::new(),
            detail: None,
        }
    }

    pub(crate) fn record_reading(&mut self, reading: &ImbalanceReading) {
        self.imbalance_detected = reading.needs_rebalancing;
        self.initial_imbalance = reading.combined();
    }

    pub(crate) fn finish(&mut self, outcome: RunOutcome, detail: Option<String>) {
        self.outcome = outcome;
        self.detail = detail;
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn count(&self, status: MoveStatus) -> usize {
        self.moves.iter().filter(|m| m.status == status).count()
    }
}
