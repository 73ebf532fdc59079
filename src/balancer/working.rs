use super::stats;
use super::types::{
    Candidate, ClusterSnapshot, HostId, HostView, Metric, MetricSelection, WorkloadId,
    WorkloadView,
};
use crate::config::ClusterDrsConfig;
use crate::error::DrsError;
use std::collections::HashMap;

/// Mutable per-host tallies for what-if evaluation.
#[derive(Debug, Clone)]
pub(crate) struct HostTally {
    pub id: HostId,
    /// Total capacity scaled by the overprovisioning factor.
    pub cpu_capacity: f64,
    pub memory_capacity: f64,
    pub cpu_used: u64,
    pub memory_used: u64,
}

impl HostTally {
    pub(crate) const fn capacity(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.cpu_capacity,
            Metric::Memory => self.memory_capacity,
        }
    }

    pub(crate) const fn used(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Cpu => self.cpu_used,
            Metric::Memory => self.memory_used,
        }
    }

    pub(crate) fn free(&self, metric: Metric) -> f64 {
        (self.capacity(metric) - self.used(metric) as f64).max(0.0)
    }

    fn utilization_with(&self, metric: Metric, delta: i128) -> Option<f64> {
        let capacity = self.capacity(metric);
        if capacity <= 0.0 {
            return None;
        }
        let used = (i128::from(self.used(metric)) + delta).max(0);
        Some(used as f64 / capacity)
    }
}

/// Working copy of a cluster's placement used during one planning run.
///
/// Only [`WorkingState::apply`] mutates it; every scoring helper borrows it
/// immutably.
#[derive(Debug, Clone)]
pub(crate) struct WorkingState<'a> {
    snapshot: &'a ClusterSnapshot,
    selection: MetricSelection,
    hosts: Vec<HostTally>,
    index: HashMap<HostId, usize>,
    placement: HashMap<WorkloadId, HostId>,
}

impl<'a> WorkingState<'a> {
    pub(crate) fn new(snapshot: &'a ClusterSnapshot, config: &ClusterDrsConfig) -> Self {
        let hosts: Vec<HostTally> = snapshot
            .hosts
            .iter()
            .map(|h| HostTally {
                id: h.id,
                cpu_capacity: h.cpu_total_mhz as f64 * config.cpu_overprovisioning,
                memory_capacity: h.memory_total_bytes as f64 * config.memory_overprovisioning,
                cpu_used: h.cpu_used_mhz,
                memory_used: h.memory_used_bytes,
            })
            .collect();
        let index = hosts.iter().enumerate().map(|(i, h)| (h.id, i)).collect();
        let placement = snapshot.workloads.values().map(|w| (w.id, w.host_id)).collect();

        Self { snapshot, selection: config.metric, hosts, index, placement }
    }

    pub(crate) const fn snapshot(&self) -> &'a ClusterSnapshot {
        self.snapshot
    }

    pub(crate) const fn selection(&self) -> MetricSelection {
        self.selection
    }

    pub(crate) fn tally(&self, host_id: HostId) -> Option<&HostTally> {
        self.index.get(&host_id).map(|&i| &self.hosts[i])
    }

    /// Static description of a host (hypervisor, tags, avoid flag).
    pub(crate) fn host_view(&self, host_id: HostId) -> Option<&'a HostView> {
        self.index.get(&host_id).map(|&i| &self.snapshot.hosts[i])
    }

    pub(crate) fn workload(&self, workload_id: WorkloadId) -> Option<&'a WorkloadView> {
        self.snapshot.workloads.get(&workload_id)
    }

    pub(crate) fn current_host(&self, workload_id: WorkloadId) -> Option<HostId> {
        self.placement.get(&workload_id).copied()
    }

    /// Per-host utilization ratios. Hosts without capacity are left out.
    pub(crate) fn ratios(&self, metric: Metric) -> Vec<f64> {
        self.hosts.iter().filter_map(|h| h.utilization_with(metric, 0)).collect()
    }

    /// Ratios as they would be after `candidate` is applied.
    pub(crate) fn ratios_after(&self, metric: Metric, candidate: &Candidate) -> Vec<f64> {
        let demand = self.workload(candidate.workload_id).map_or(0, |w| w.demand(metric));
        let demand = i128::from(demand);
        self.hosts
            .iter()
            .filter_map(|h| {
                let delta = if h.id == candidate.source_host_id {
                    -demand
                } else if h.id == candidate.destination_host_id {
                    demand
                } else {
                    0
                };
                h.utilization_with(metric, delta)
            })
            .collect()
    }

    /// Sum of the imbalance of every metric in scope.
    pub(crate) fn imbalance_in_scope(&self) -> Result<f64, DrsError> {
        let mut total = 0.0;
        for &metric in self.selection.metrics() {
            total += stats::imbalance(&self.ratios(metric))?;
        }
        Ok(total)
    }

    /// Move a workload between hosts and shift its demand with it.
    pub(crate) fn apply(&mut self, candidate: &Candidate) {
        let Some(workload) = self.snapshot.workloads.get(&candidate.workload_id) else {
            return;
        };
        if let Some(&src) = self.index.get(&candidate.source_host_id) {
            let h = &mut self.hosts[src];
            h.cpu_used = h.cpu_used.saturating_sub(workload.cpu_mhz);
            h.memory_used = h.memory_used.saturating_sub(workload.memory_bytes);
        }
        if let Some(&dst) = self.index.get(&candidate.destination_host_id) {
            let h = &mut self.hosts[dst];
            h.cpu_used += workload.cpu_mhz;
            h.memory_used += workload.memory_bytes;
        }
        self.placement.insert(candidate.workload_id, candidate.destination_host_id);
    }
}
