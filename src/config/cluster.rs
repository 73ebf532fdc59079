use super::defaults::{
    DEFAULT_ALGORITHM, DEFAULT_INTERVAL_MINUTES, DEFAULT_ITERATION_FRACTION, DEFAULT_METRIC,
    DEFAULT_THRESHOLD,
};
use crate::balancer::MetricSelection;
use crate::error::DrsError;
use serde::{Deserialize, Serialize};

/// Per-cluster DRS settings. Loaded fresh at the start of every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ClusterDrsConfig {
    pub enabled: bool,
    /// Minutes between scheduled runs.
    pub interval_minutes: u32,
    /// Fraction of the cluster's workload count bounding moves per run.
    pub iteration_fraction: f64,
    pub algorithm: String,
    /// Imbalance (coefficient of variation) above which a metric counts as imbalanced.
    pub threshold: f64,
    pub metric: MetricSelection,
    pub cpu_overprovisioning: f64,
    pub memory_overprovisioning: f64,
}

impl Default for ClusterDrsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            iteration_fraction: DEFAULT_ITERATION_FRACTION,
            algorithm: DEFAULT_ALGORITHM.to_string(),
            threshold: DEFAULT_THRESHOLD,
            metric: DEFAULT_METRIC,
            cpu_overprovisioning: 1.0,
            memory_overprovisioning: 1.0,
        }
    }
}

impl ClusterDrsConfig {
    /// Upper bound on moves for one run: `max(1, round(fraction * workloads))`.
    pub(crate) fn max_iterations(&self, total_workloads: usize) -> usize {
        let scaled = (self.iteration_fraction * total_workloads as f64).round();
        (scaled as usize).max(1)
    }

    pub(crate) fn validate(&self) -> Result<(), DrsError> {
        if !(0.0..=1.0).contains(&self.iteration_fraction) {
            return Err(DrsError::InvalidConfig(
                "iteration_fraction must be between 0.0 and 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(DrsError::InvalidConfig("threshold must be between 0.0 and 1.0".into()));
        }
        if self.interval_minutes == 0 {
            return Err(DrsError::InvalidConfig("interval_minutes must be at least 1".into()));
        }
        if !(self.cpu_overprovisioning > 0.0 && self.memory_overprovisioning > 0.0) {
            return Err(DrsError::InvalidConfig("overprovisioning factors must be > 0".into()));
        }
        Ok(())
    }
}
