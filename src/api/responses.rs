use crate::balancer::MetricSelection;
use crate::coordinator::ClusterStatus;
use serde::{Deserialize, Serialize};

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) const fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub(crate) fn err(msg: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(msg.into()) }
    }
}

/// Request body for POST /api/clusters/{cluster_id}/drs/config.
///
/// Missing fields keep their stored value, or the daemon default for a
/// cluster that has no config yet.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct DrsConfigUpdateRequest {
    pub enabled: Option<bool>,
    pub interval_minutes: Option<u32>,
    pub iteration_fraction: Option<f64>,
    pub algorithm: Option<String>,
    pub threshold: Option<f64>,
    pub metric: Option<MetricSelection>,
    pub cpu_overprovisioning: Option<f64>,
    pub memory_overprovisioning: Option<f64>,
}

/// Query for GET /api/clusters/{cluster_id}/drs/runs.
#[derive(Debug, Deserialize)]
pub(crate) struct RunListQuery {
    pub limit: Option<u32>,
}

/// Daemon summary returned by the status endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    pub version: String,
    pub tick_seconds: u64,
    pub clusters: Vec<ClusterStatus>,
}

#[derive(Debug, Serialize)]
pub(crate) struct InventoryAccepted {
    pub cluster_id: i64,
    pub hosts: usize,
    pub workloads: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct CancelResponse {
    pub cluster_id: i64,
    pub cancel_requested: bool,
}
