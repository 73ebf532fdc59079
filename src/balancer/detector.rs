use super::stats;
use super::types::{ClusterSnapshot, Metric, MetricSelection};
use super::working::WorkingState;
use crate::config::ClusterDrsConfig;
use crate::error::DrsError;
use serde::Serialize;
use tracing::debug;

/// Imbalance values measured for one cluster, and the resulting decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct ImbalanceReading {
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    pub threshold: f64,
    pub needs_rebalancing: bool,
}

impl ImbalanceReading {
    const fn nothing_to_balance(threshold: f64) -> Self {
        Self { cpu: None, memory: None, threshold, needs_rebalancing: false }
    }

    /// Combined imbalance over the metrics that were measured.
    pub(crate) fn combined(&self) -> Option<f64> {
        match (self.cpu, self.memory) {
            (None, None) => None,
            (cpu, memory) => Some(cpu.unwrap_or(0.0) + memory.unwrap_or(0.0)),
        }
    }
}

/// Measure the cluster and decide whether it needs rebalancing.
pub(crate) fn evaluate(
    snapshot: &ClusterSnapshot,
    config: &ClusterDrsConfig,
) -> Result<ImbalanceReading, DrsError> {
    if snapshot.hosts.len() < 2 || snapshot.workload_count() == 0 {
        debug!(
            "Cluster {} has {} hosts and {} workloads, nothing to balance",
            snapshot.cluster_id,
            snapshot.hosts.len(),
            snapshot.workload_count()
        );
        return Ok(ImbalanceReading::nothing_to_balance(config.threshold));
    }

    let state = WorkingState::new(snapshot, config);
    let mut reading = ImbalanceReading::nothing_to_balance(config.threshold);

    for &metric in config.metric.metrics() {
        let value = stats::imbalance(&state.ratios(metric))?;
        match metric {
            Metric::Cpu => reading.cpu = Some(value),
            Metric::Memory => reading.memory = Some(value),
        }
    }

    let over = |v: Option<f64>| v.is_some_and(|v| v > config.threshold);
    reading.needs_rebalancing = match config.metric {
        MetricSelection::Cpu => over(reading.cpu),
        MetricSelection::Memory => over(reading.memory),
        MetricSelection::Either => over(reading.cpu) || over(reading.memory),
        MetricSelection::Both => over(reading.cpu) && over(reading.memory),
    };

    debug!(
        "Cluster {} imbalance: cpu={:?} memory={:?} threshold={} metric={} -> {}",
        snapshot.cluster_id,
        reading.cpu,
        reading.memory,
        config.threshold,
        config.metric,
        reading.needs_rebalancing
    );

    Ok(reading)
}

#[cfg(test)]
pub(crate) fn needs_rebalancing(
    snapshot: &ClusterSnapshot,
    config: &ClusterDrsConfig,
) -> Result<bool, DrsError> {
    Ok(evaluate(snapshot, config)?.needs_rebalancing)
}
