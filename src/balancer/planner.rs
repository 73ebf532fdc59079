use super::scorer::Algorithm;
use super::types::{
    Candidate, ClusterSnapshot, DrsPlan, HostView, Metric, PlannedMove, StopReason, WorkloadView,
};
use super::working::WorkingState;
use crate::config::ClusterDrsConfig;
use crate::error::DrsError;
use std::cmp::Ordering;
use tracing::{debug, info};

/// Generate a DRS plan for one cluster.
///
/// Greedy and bounded: each iteration applies the single best-scoring move to
/// a working copy of the placement, so later moves are scored against the
/// post-move state. Stops when nothing has a positive net score, when no
/// candidate is feasible, or when the iteration budget runs out.
pub(crate) fn plan(
    snapshot: &ClusterSnapshot,
    config: &ClusterDrsConfig,
) -> Result<DrsPlan, DrsError> {
    let algorithm = Algorithm::from_name(&config.algorithm)?;
    plan_with(snapshot, config, algorithm)
}

pub(crate) fn plan_with(
    snapshot: &ClusterSnapshot,
    config: &ClusterDrsConfig,
    algorithm: Algorithm,
) -> Result<DrsPlan, DrsError> {
    let max_iterations = config.max_iterations(snapshot.workload_count());
    let mut state = WorkingState::new(snapshot, config);
    let initial_imbalance = state.imbalance_in_scope().ok();

    info!(
        "DRS planning for cluster {}: algorithm={}, metric={}, max_iterations={}, imbalance={:?}",
        snapshot.cluster_id, algorithm, config.metric, max_iterations, initial_imbalance
    );

    let mut moves: Vec<PlannedMove> = Vec::new();
    let mut stop_reason = StopReason::IterationBudgetExhausted;

    for iteration in 0..max_iterations {
        let candidates = feasible_candidates(&state);
        if candidates.is_empty() {
            debug!("Iteration {}: no feasible candidates", iteration);
            stop_reason = StopReason::NoFeasibleCandidates;
            break;
        }

        let mut best: Option<PlannedMove> = None;
        for candidate in candidates {
            let score = algorithm.score(&state, &candidate)?;
            if score.net <= 0.0 {
                continue;
            }
            let scored = PlannedMove { candidate, score };
            if best.as_ref().is_none_or(|b| ranks_before(&scored, b)) {
                best = Some(scored);
            }
        }

        let Some(chosen) = best else {
            debug!("Iteration {}: no candidate improves the cluster", iteration);
            stop_reason = StopReason::Converged;
            break;
        };

        debug!(
            "Iteration {}: workload {} host {} -> {} (benefit={:.4}, cost={:.4}, net={:.4})",
            iteration,
            chosen.candidate.workload_id,
            chosen.candidate.source_host_id,
            chosen.candidate.destination_host_id,
            chosen.score.benefit,
            chosen.score.cost,
            chosen.score.net
        );

        state.apply(&chosen.candidate);
        moves.push(chosen);
    }

    let projected_imbalance = state.imbalance_in_scope().ok();

    info!(
        "DRS plan for cluster {}: {} moves ({}), imbalance {:?} -> {:?}",
        snapshot.cluster_id,
        moves.len(),
        stop_reason,
        initial_imbalance,
        projected_imbalance
    );

    Ok(DrsPlan {
        cluster_id: snapshot.cluster_id,
        algorithm: algorithm.name().to_string(),
        moves,
        max_iterations,
        stop_reason,
        initial_imbalance,
        projected_imbalance,
    })
}

/// Highest net first; ties go to the cheaper move, then the lower workload
/// id, then the lower destination id.
pub(crate) fn ranks_before(a: &PlannedMove, b: &PlannedMove) -> bool {
    let order = b
        .score
        .net
        .total_cmp(&a.score.net)
        .then_with(|| a.score.cost.total_cmp(&b.score.cost))
        .then_with(|| a.candidate.workload_id.cmp(&b.candidate.workload_id))
        .then_with(|| a.candidate.destination_host_id.cmp(&b.candidate.destination_host_id));
    order == Ordering::Less
}

/// Every (workload, destination) pair that could legally be applied to the
/// current working state.
fn feasible_candidates(state: &WorkingState<'_>) -> Vec<Candidate> {
    let snapshot = state.snapshot();
    let mut candidates = Vec::new();

    for workload in snapshot.workloads.values() {
        if workload.pinned {
            continue;
        }
        let Some(current) = state.current_host(workload.id) else {
            continue;
        };
        let Some(source) = state.host_view(current) else {
            continue;
        };

        for destination in &snapshot.hosts {
            if destination.id == current || destination.avoid {
                continue;
            }
            if destination.hypervisor != source.hypervisor {
                continue;
            }
            if !storage_compatible(workload, destination) {
                continue;
            }
            if !has_room(state, workload, destination) {
                continue;
            }

            candidates.push(Candidate {
                workload_id: workload.id,
                source_host_id: current,
                destination_host_id: destination.id,
                requires_storage_motion: workload.requires_storage_motion,
            });
        }
    }

    candidates
}

/// A storage-motion move needs a destination that can take the workload's disks.
fn storage_compatible(workload: &WorkloadView, destination: &HostView) -> bool {
    if !workload.requires_storage_motion {
        return true;
    }
    match &workload.storage_tag {
        Some(tag) => destination.storage_tags.contains(tag),
        None => !destination.storage_tags.is_empty(),
    }
}

fn has_room(state: &WorkingState<'_>, workload: &WorkloadView, destination: &HostView) -> bool {
    let Some(tally) = state.tally(destination.id) else {
        return false;
    };
    [Metric::Cpu, Metric::Memory]
        .into_iter()
        .all(|m| tally.free(m) >= workload.demand(m) as f64)
}
