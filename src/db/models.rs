use crate::balancer::{ClusterId, HostId, WorkloadId};
use serde::{Deserialize, Serialize};

/// A cluster known to the inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Cluster {
    pub id: ClusterId,
    pub name: String,
    pub host_count: u32,
    pub workload_count: u32,
    pub drs_configured: bool,
    pub updated_at: Option<String>,
}

/// Full host/workload inventory for one cluster, as pushed by the
/// capacity-bookkeeping side. Replaces whatever was stored before.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Inventory {
    pub name: String,
    #[serde(default)]
    pub hosts: Vec<InventoryHost>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InventoryHost {
    pub id: HostId,
    pub name: String,
    pub hypervisor: String,
    pub cpu_total_mhz: u64,
    pub cpu_used_mhz: u64,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    #[serde(default)]
    pub avoid: bool,
    #[serde(default)]
    pub host_tags: Vec<String>,
    #[serde(default)]
    pub storage_tags: Vec<String>,
    #[serde(default)]
    pub workloads: Vec<InventoryWorkload>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InventoryWorkload {
    pub id: WorkloadId,
    pub name: String,
    pub cpu_mhz: u64,
    pub memory_bytes: u64,
    #[serde(default)]
    pub requires_storage_motion: bool,
    pub storage_tag: Option<String>,
    pub host_tag: Option<String>,
    #[serde(default)]
    pub pinned: bool,
}

/// One row of run history, without its moves.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RunSummary {
    pub run_id: String,
    pub cluster_id: ClusterId,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub outcome: String,
    pub imbalance_detected: bool,
    pub algorithm: Option<String>,
    pub initial_imbalance: Option<f64>,
    pub projected_imbalance: Option<f64>,
    pub total_moves: u32,
    pub detail: Option<String>,
}
