use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::balancer::{ClusterId, HostId, WorkloadId};

/// Errors raised by the DRS core.
///
/// Configuration errors are detected before any planning work. Statistics
/// errors mean the cluster cannot be evaluated on this run. `AlreadyRunning`
/// is only ever surfaced to on-demand triggers.
#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum DrsError {
    #[error("no DRS configuration found for cluster {0}")]
    ConfigNotFound(ClusterId),

    #[error("unknown DRS algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("invalid DRS configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("division by zero: {0}")]
    DivisionByZero(String),

    #[error("cluster {0} not found")]
    ClusterNotFound(ClusterId),

    #[error("snapshot unavailable for cluster {cluster_id}: {reason}")]
    SnapshotUnavailable { cluster_id: ClusterId, reason: String },

    #[error("DRS is already running for cluster {0}")]
    AlreadyRunning(ClusterId),

    #[error("storage error: {0}")]
    Storage(String),
}

impl DrsError {
    /// True for errors that mean "cannot evaluate imbalance", which skip a run
    /// instead of failing it.
    pub(crate) const fn is_statistics(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::DivisionByZero(_))
    }

    pub(crate) fn snapshot_unavailable(cluster_id: ClusterId, reason: impl fmt::Display) -> Self {
        Self::SnapshotUnavailable { cluster_id, reason: reason.to_string() }
    }
}

/// Why a single migration attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum MigrationErrorKind {
    ResourceUnavailable,
    ConcurrentOperation,
    OperationTimedOut,
    Other,
}

impl MigrationErrorKind {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::ResourceUnavailable => "resource_unavailable",
            Self::ConcurrentOperation => "concurrent_operation",
            Self::OperationTimedOut => "operation_timed_out",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for MigrationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MigrationErrorKind {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "resource_unavailable" => Ok(Self::ResourceUnavailable),
            "concurrent_operation" => Ok(Self::ConcurrentOperation),
            "operation_timed_out" => Ok(Self::OperationTimedOut),
            "other" => Ok(Self::Other),
            _ => Err(format!("invalid migration error kind: {s}")),
        }
    }
}

/// A failed migration as reported by the migration capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("migration of workload {workload_id} to host {destination_host_id} failed ({kind}): {message}")]
pub(crate) struct MigrationFailure {
    pub kind: MigrationErrorKind,
    pub workload_id: WorkloadId,
    pub destination_host_id: HostId,
    pub message: String,
}

impl MigrationFailure {
    pub(crate) fn new(
        kind: MigrationErrorKind,
        workload_id: WorkloadId,
        destination_host_id: HostId,
        message: impl Into<String>,
    ) -> Self {
        Self { kind, workload_id, destination_host_id, message: message.into() }
    }
}
