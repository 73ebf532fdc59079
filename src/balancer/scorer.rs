use super::stats;
use super::types::{Candidate, Metric, ScoreTriple};
use super::working::WorkingState;
use crate::error::DrsError;
use serde::Serialize;
use std::fmt;

/// Cost weight applied to the condensed (memory-dominated) migration cost.
const CONDENSED_COST_WEIGHT: f64 = 0.1;
/// Disk copy multiplies the cost of a condensed move.
const CONDENSED_STORAGE_MOTION_FACTOR: f64 = 4.0;

const BALANCED_COST_WEIGHT: f64 = 0.05;
const BALANCED_MOVE_OVERHEAD: f64 = 0.005;
const BALANCED_STORAGE_MOTION_WEIGHT: f64 = 0.5;

/// Cost/benefit scoring strategy, selected per cluster by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Algorithm {
    /// Single cost figure driven by the memory that has to be copied.
    Condensed,
    /// Per-metric cost plus a fixed overhead per move.
    Balanced,
}

impl Algorithm {
    pub(crate) const ALL: [Self; 2] = [Self::Condensed, Self::Balanced];

    pub(crate) fn from_name(name: &str) -> Result<Self, DrsError> {
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| DrsError::UnknownAlgorithm(name.to_string()))
    }

    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Condensed => "condensed",
            Self::Balanced => "balanced",
        }
    }

    /// Score moving `candidate` against the current working state.
    ///
    /// Pure: the state is only read, so re-scoring the same state yields the
    /// same triple.
    pub(crate) fn score(
        self,
        state: &WorkingState<'_>,
        candidate: &Candidate,
    ) -> Result<ScoreTriple, DrsError> {
        let benefit = imbalance_reduction(state, candidate)?;

        let (Some(workload), Some(destination), Some(dest_view)) = (
            state.workload(candidate.workload_id),
            state.tally(candidate.destination_host_id),
            state.host_view(candidate.destination_host_id),
        ) else {
            return Ok(ScoreTriple::infeasible(benefit));
        };

        if let Some(tag) = &workload.host_tag {
            if !dest_view.host_tags.contains(tag) {
                return Ok(ScoreTriple::infeasible(benefit));
            }
        }

        let memory_fraction =
            fraction(workload.memory_bytes, destination.capacity(Metric::Memory));

        let cost = match self {
            Self::Condensed => {
                let base = CONDENSED_COST_WEIGHT * memory_fraction;
                if candidate.requires_storage_motion {
                    base * CONDENSED_STORAGE_MOTION_FACTOR
                } else {
                    base
                }
            }
            Self::Balanced => {
                let cpu_fraction = fraction(workload.cpu_mhz, destination.capacity(Metric::Cpu));
                let mut cost = BALANCED_COST_WEIGHT * (cpu_fraction + memory_fraction) / 2.0
                    + BALANCED_MOVE_OVERHEAD;
                if candidate.requires_storage_motion {
                    cost += BALANCED_STORAGE_MOTION_WEIGHT * memory_fraction;
                }
                cost
            }
        };

        Ok(ScoreTriple::new(benefit, cost))
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How much the move lowers the imbalance of the metrics in scope, floored at 0.
fn imbalance_reduction(state: &WorkingState<'_>, candidate: &Candidate) -> Result<f64, DrsError> {
    let mut reduction = 0.0;
    for &metric in state.selection().metrics() {
        let before = stats::imbalance(&state.ratios(metric))?;
        let after = stats::imbalance(&state.ratios_after(metric, candidate))?;
        reduction += before - after;
    }
    Ok(reduction.max(0.0))
}

fn fraction(demand: u64, capacity: f64) -> f64 {
    if capacity <= 0.0 {
        return 0.0;
    }
    demand as f64 / capacity
}
