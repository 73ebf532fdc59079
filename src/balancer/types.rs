use crate::error::DrsError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

pub(crate) type ClusterId = i64;
pub(crate) type HostId = i64;
pub(crate) type WorkloadId = i64;

/// A resource dimension tracked per host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Metric {
    Cpu,
    Memory,
}

/// Which metrics the imbalance decision looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum MetricSelection {
    Cpu,
    Memory,
    Either,
    Both,
}

impl MetricSelection {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Either => "either",
            Self::Both => "both",
        }
    }

    /// Metrics whose imbalance this selection evaluates.
    pub(crate) const fn metrics(self) -> &'static [Metric] {
        match self {
            Self::Cpu => &[Metric::Cpu],
            Self::Memory => &[Metric::Memory],
            Self::Either | Self::Both => &[Metric::Cpu, Metric::Memory],
        }
    }
}

impl fmt::Display for MetricSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MetricSelection {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "cpu" => Ok(Self::Cpu),
            "memory" => Ok(Self::Memory),
            "either" => Ok(Self::Either),
            "both" => Ok(Self::Both),
            _ => Err(format!("invalid imbalance metric: {s}")),
        }
    }
}

/// A physical host as seen at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct HostView {
    pub id: HostId,
    pub name: String,
    pub hypervisor: String,
    pub cpu_total_mhz: u64,
    pub cpu_used_mhz: u64,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    pub workloads: BTreeSet<WorkloadId>,
    /// Excluded as a migration destination (e.g. maintenance).
    pub avoid: bool,
    pub host_tags: BTreeSet<String>,
    /// Tags of the pools this host can receive storage-motioned disks on.
    pub storage_tags: BTreeSet<String>,
}

/// A running VM as seen at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct WorkloadView {
    pub id: WorkloadId,
    pub name: String,
    pub cpu_mhz: u64,
    pub memory_bytes: u64,
    pub host_id: HostId,
    /// Disks live on storage the destination does not share, so any move
    /// also relocates them.
    pub requires_storage_motion: bool,
    pub storage_tag: Option<String>,
    pub host_tag: Option<String>,
    /// Never considered for migration.
    pub pinned: bool,
}

impl WorkloadView {
    pub(crate) const fn demand(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Cpu => self.cpu_mhz,
            Metric::Memory => self.memory_bytes,
        }
    }
}

/// Point-in-time view of one cluster. Planning never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ClusterSnapshot {
    pub cluster_id: ClusterId,
    pub hosts: Vec<HostView>,
    pub workloads: BTreeMap<WorkloadId, WorkloadView>,
}

impl ClusterSnapshot {
    /// Build a snapshot, checking that every workload sits on exactly one
    /// known host.
    pub(crate) fn new(
        cluster_id: ClusterId,
        hosts: Vec<HostView>,
        workloads: Vec<WorkloadView>,
    ) -> Result<Self, DrsError> {
        let mut owner: HashMap<WorkloadId, HostId> = HashMap::new();
        for host in &hosts {
            for &workload_id in &host.workloads {
                if let Some(other) = owner.insert(workload_id, host.id) {
                    return Err(DrsError::snapshot_unavailable(
                        cluster_id,
                        format!("workload {workload_id} assigned to hosts {other} and {}", host.id),
                    ));
                }
            }
        }

        let mut by_id = BTreeMap::new();
        for workload in workloads {
            match owner.get(&workload.id) {
                Some(&host_id) if host_id == workload.host_id => {}
                _ => {
                    return Err(DrsError::snapshot_unavailable(
                        cluster_id,
                        format!(
                            "workload {} claims host {} which does not list it",
                            workload.id, workload.host_id
                        ),
                    ));
                }
            }
            by_id.insert(workload.id, workload);
        }

        if by_id.len() != owner.len() {
            return Err(DrsError::snapshot_unavailable(
                cluster_id,
                "host workload sets reference unknown workloads",
            ));
        }

        Ok(Self { cluster_id, hosts, workloads: by_id })
    }

    pub(crate) fn workload_count(&self) -> usize {
        self.workloads.len()
    }
}

/// A move under consideration. Exists only inside a planning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Candidate {
    pub workload_id: WorkloadId,
    pub source_host_id: HostId,
    pub destination_host_id: HostId,
    pub requires_storage_motion: bool,
}

/// Scores attached to a candidate. `net` is the only ranking key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct ScoreTriple {
    pub benefit: f64,
    pub cost: f64,
    pub net: f64,
}

impl ScoreTriple {
    pub(crate) fn new(benefit: f64, cost: f64) -> Self {
        Self { benefit, cost, net: benefit - cost }
    }

    pub(crate) const fn infeasible(benefit: f64) -> Self {
        Self { benefit, cost: f64::INFINITY, net: f64::NEG_INFINITY }
    }
}

/// A candidate that the planner selected, with its score at selection time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct PlannedMove {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub score: ScoreTriple,
}

/// Why the greedy loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum StopReason {
    /// No feasible candidate had a positive net score.
    Converged,
    /// No feasible candidate existed at all.
    NoFeasibleCandidates,
    IterationBudgetExhausted,
}

impl StopReason {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::NoFeasibleCandidates => "no_feasible_candidates",
            Self::IterationBudgetExhausted => "iteration_budget_exhausted",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for StopReason {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "converged" => Ok(Self::Converged),
            "no_feasible_candidates" => Ok(Self::NoFeasibleCandidates),
            "iteration_budget_exhausted" => Ok(Self::IterationBudgetExhausted),
            _ => Err(format!("invalid stop reason: {s}")),
        }
    }
}

/// Result of running the planner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct DrsPlan {
    pub cluster_id: ClusterId,
    pub algorithm: String,
    /// In application order.
    pub moves: Vec<PlannedMove>,
    pub max_iterations: usize,
    pub stop_reason: StopReason,
    /// Imbalance of the metrics in scope, when it could be evaluated.
    pub initial_imbalance: Option<f64>,
    pub projected_imbalance: Option<f64>,
}
