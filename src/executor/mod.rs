mod collaborators;
pub(crate) mod command;
mod report;

pub(crate) use collaborators::{MigrationCapability, RunLog, SnapshotProvider};
pub(crate) use command::CommandMigrator;
pub(crate) use report::{DrsRunReport, MoveRecord, MoveStatus, RunOutcome};
pub(crate) use report::{SKIPPED_ABORTED, SKIPPED_CANCELLED, SKIPPED_PRIOR_FAILURE};

use crate::balancer::{self, Algorithm, ClusterId, DrsPlan, ImbalanceReading};
use crate::error::{DrsError, MigrationErrorKind, MigrationFailure};
use crate::events::{Event, EventHub};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Detail attached to a run that found nothing worth moving.
const NO_FURTHER_IMPROVEMENT: &str = "no further improvement possible";

/// Result of a dry run: what DRS would do right now.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct DrsPreview {
    pub reading: ImbalanceReading,
    pub plan: Option<DrsPlan>,
}

/// Runs DRS for one cluster at a time: load, detect, plan, migrate.
pub(crate) struct DrsExecutor {
    provider: Arc<dyn SnapshotProvider>,
    migrator: Arc<dyn MigrationCapability>,
    run_log: Arc<dyn RunLog>,
    event_hub: EventHub,
    migration_timeout: Duration,
}

impl DrsExecutor {
    pub(crate) fn new(
        provider: Arc<dyn SnapshotProvider>,
        migrator: Arc<dyn MigrationCapability>,
        run_log: Arc<dyn RunLog>,
        event_hub: EventHub,
        migration_timeout: Duration,
    ) -> Self {
        Self { provider, migrator, run_log, event_hub, migration_timeout }
    }

    pub(crate) fn provider(&self) -> &Arc<dyn SnapshotProvider> {
        &self.provider
    }

    pub(crate) fn run_log(&self) -> &Arc<dyn RunLog> {
        &self.run_log
    }

    pub(crate) const fn event_hub(&self) -> &EventHub {
        &self.event_hub
    }

    /// Execute one full DRS run for `cluster_id`.
    ///
    /// Returns `Err` only for load-time failures (missing config, bad
    /// algorithm, unreadable snapshot). Migration failures end up in the
    /// report. `cancel` is checked between moves, never during one.
    pub(crate) async fn run(
        &self,
        cluster_id: ClusterId,
        cancel: &CancellationToken,
    ) -> Result<DrsRunReport, DrsError> {
        let start = Instant::now();
        let config = self.provider.cluster_config(cluster_id)?;

        if !config.enabled {
            info!("DRS disabled for cluster {}, skipping", cluster_id);
            let mut report = DrsRunReport::start(cluster_id);
            report.finish(RunOutcome::Skipped, Some("DRS is disabled for this cluster".into()));
            self.persist(&report);
            self.publish_complete(&report, start);
            return Ok(report);
        }

        config.validate()?;
        let algorithm = Algorithm::from_name(&config.algorithm)?;
        let snapshot = self.provider.cluster_snapshot(cluster_id)?;

        let mut report = DrsRunReport::start(cluster_id);
        report.algorithm = Some(algorithm.name().to_string());
        self.persist(&report);
        self.event_hub.publish(Event::RunStarted { cluster_id, run_id: report.run_id });

        let reading = match balancer::evaluate(&snapshot, &config) {
            Ok(reading) => reading,
            Err(e) if e.is_statistics() => {
                return Ok(self.conclude(report, RunOutcome::CannotEvaluate, Some(e.to_string()), start));
            }
            Err(e) => return Err(e),
        };
        report.record_reading(&reading);
        self.event_hub.publish(Event::ImbalanceEvaluated {
            cluster_id,
            cpu: reading.cpu,
            memory: reading.memory,
            threshold: reading.threshold,
            needs_rebalancing: reading.needs_rebalancing,
        });

        if !reading.needs_rebalancing {
            info!("Cluster {} is balanced within threshold {}", cluster_id, config.threshold);
            return Ok(self.conclude(report, RunOutcome::NoActionNeeded, None, start));
        }

        let plan = match balancer::plan_with(&snapshot, &config, algorithm) {
            Ok(plan) => plan,
            Err(e) if e.is_statistics() => {
                return Ok(self.conclude(report, RunOutcome::CannotEvaluate, Some(e.to_string()), start));
            }
            Err(e) => return Err(e),
        };

        report.projected_imbalance = plan.projected_imbalance;
        report.stop_reason = Some(plan.stop_reason);
        report.moves = plan
            .moves
            .iter()
            .enumerate()
            .map(|(i, m)| MoveRecord::pending(i as u32 + 1, m))
            .collect();

        if report.moves.is_empty() {
            return Ok(self.conclude(
                report,
                RunOutcome::NoImprovement,
                Some(NO_FURTHER_IMPROVEMENT.into()),
                start,
            ));
        }

        self.persist(&report);
        self.event_hub.publish(Event::PlanReady {
            cluster_id,
            run_id: report.run_id,
            total_moves: report.moves.len() as u32,
            projected_imbalance: report.projected_imbalance,
        });

        let outcome = self.execute_moves(&mut report, cancel).await;
        Ok(self.conclude(report, outcome, None, start))
    }

    /// Compute what a run would do without migrating anything.
    pub(crate) fn preview(&self, cluster_id: ClusterId) -> Result<DrsPreview, DrsError> {
        let config = self.provider.cluster_config(cluster_id)?;
        config.validate()?;
        let snapshot = self.provider.cluster_snapshot(cluster_id)?;

        let reading = balancer::evaluate(&snapshot, &config)?;
        let plan = if reading.needs_rebalancing {
            Some(balancer::plan(&snapshot, &config)?)
        } else {
            None
        };
        Ok(DrsPreview { reading, plan })
    }

    /// Submit planned moves in order. The first failure skips the rest.
    async fn execute_moves(
        &self,
        report: &mut DrsRunReport,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let run_id = report.run_id;
        let total = report.moves.len();
        let mut skip_reason: Option<&'static str> = None;
        let mut cancelled = false;

        for record in &mut report.moves {
            if skip_reason.is_none() && cancel.is_cancelled() {
                info!("Run {} cancelled before move {}/{}", run_id, record.order, total);
                skip_reason = Some(SKIPPED_CANCELLED);
                cancelled = true;
            }

            if let Some(reason) = skip_reason {
                record.status = MoveStatus::Skipped;
                record.detail = Some(reason.to_string());
            } else {
                info!(
                    "Run {}: migrating workload {} host {} -> {} ({}/{}){}",
                    run_id,
                    record.workload_id,
                    record.source_host_id,
                    record.destination_host_id,
                    record.order,
                    total,
                    if record.requires_storage_motion { " with storage motion" } else { "" }
                );

                match self.migrate_bounded(record).await {
                    Ok(()) => {
                        record.status = MoveStatus::Succeeded;
                    }
                    Err(failure) => {
                        warn!("Run {}: {}", run_id, failure);
                        record.status = MoveStatus::Failed;
                        record.error_kind = Some(failure.kind);
                        record.detail = Some(failure.message);
                        skip_reason = Some(SKIPPED_PRIOR_FAILURE);
                    }
                }
            }

            if let Err(e) = self.run_log.save_move(run_id, record) {
                warn!("Failed to record move {} of run {}: {:#}", record.order, run_id, e);
            }
            self.event_hub.publish(Event::MoveComplete {
                run_id,
                order: record.order,
                workload_id: record.workload_id,
                destination_host_id: record.destination_host_id,
                status: record.status,
                error_kind: record.error_kind,
            });
        }

        if cancelled {
            RunOutcome::Cancelled
        } else if report.moves.iter().any(|m| m.status == MoveStatus::Failed) {
            RunOutcome::PartiallyFailed
        } else {
            RunOutcome::Completed
        }
    }

    /// One migration with a bounded wait; running out of time is a failed move.
    async fn migrate_bounded(&self, record: &MoveRecord) -> Result<(), MigrationFailure> {
        let attempt = self.migrator.migrate(
            record.workload_id,
            record.destination_host_id,
            record.requires_storage_motion,
        );
        match tokio::time::timeout(self.migration_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(MigrationFailure::new(
                MigrationErrorKind::OperationTimedOut,
                record.workload_id,
                record.destination_host_id,
                format!("no result after {}s", self.migration_timeout.as_secs()),
            )),
        }
    }

    fn conclude(
        &self,
        mut report: DrsRunReport,
        outcome: RunOutcome,
        detail: Option<String>,
        start: Instant,
    ) -> DrsRunReport {
        report.finish(outcome, detail);
        self.persist(&report);
        self.publish_complete(&report, start);
        report
    }

    fn persist(&self, report: &DrsRunReport) {
        if let Err(e) = self.run_log.save_run(report) {
            error!("Failed to persist DRS run {}: {:#}", report.run_id, e);
        }
    }

    fn publish_complete(&self, report: &DrsRunReport, start: Instant) {
        let succeeded = report.count(MoveStatus::Succeeded);
        let failed = report.count(MoveStatus::Failed);
        let skipped = report.count(MoveStatus::Skipped);

        info!(
            "DRS run {} for cluster {} finished: {} ({} succeeded, {} failed, {} skipped)",
            report.run_id, report.cluster_id, report.outcome, succeeded, failed, skipped
        );

        self.event_hub.publish(Event::RunComplete {
            cluster_id: report.cluster_id,
            run_id: report.run_id,
            outcome: report.outcome,
            moves_succeeded: succeeded as u32,
            moves_failed: failed as u32,
            moves_skipped: skipped as u32,
            duration_seconds: start.elapsed().as_secs_f64(),
        });
    }
}
