use super::support::{
    cpu_config, host, snapshot, three_move_cluster, three_move_config, two_host_cluster, workload,
    FakeProvider, MemoryRunLog, ScriptedMigrator, CLUSTER,
};
use crate::balancer::ClusterSnapshot;
use crate::config::ClusterDrsConfig;
use crate::error::{DrsError, MigrationErrorKind};
use crate::events::{Event, EventHub};
use crate::executor::{
    DrsExecutor, MigrationCapability, MoveStatus, RunOutcome, SKIPPED_CANCELLED,
    SKIPPED_PRIOR_FAILURE,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct Harness {
    executor: DrsExecutor,
    run_log: Arc<MemoryRunLog>,
    events: EventHub,
}

fn harness(
    config: Option<ClusterDrsConfig>,
    snap: ClusterSnapshot,
    migrator: Arc<dyn MigrationCapability>,
    timeout: Duration,
) -> Harness {
    let run_log = Arc::new(MemoryRunLog::default());
    let events = EventHub::new(64);
    let executor = DrsExecutor::new(
        FakeProvider::new(config, snap),
        migrator,
        run_log.clone(),
        events.clone(),
        timeout,
    );
    Harness { executor, run_log, events }
}

const LONG: Duration = Duration::from_secs(30);

#[tokio::test]
async fn test_disabled_cluster_attempts_nothing() {
    let migrator = ScriptedMigrator::succeeding();
    let config = ClusterDrsConfig { enabled: false, ..cpu_config(0.1) };
    let h = harness(Some(config), two_host_cluster(), migrator.clone(), LONG);

    let report = h.executor.run(CLUSTER, &CancellationToken::new()).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Skipped);
    assert!(report.moves.is_empty());
    assert!(migrator.calls().is_empty());
}

#[tokio::test]
async fn test_missing_config_is_an_error() {
    let h = harness(None, two_host_cluster(), ScriptedMigrator::succeeding(), LONG);
    let err = h.executor.run(CLUSTER, &CancellationToken::new()).await.unwrap_err();
    assert_eq!(err, DrsError::ConfigNotFound(CLUSTER));
    assert_eq!(h.run_log.run_count(), 0);
}

#[tokio::test]
async fn test_invalid_config_fails_before_planning() {
    let config = ClusterDrsConfig { algorithm: "nope".into(), ..cpu_config(0.1) };
    let h = harness(Some(config), two_host_cluster(), ScriptedMigrator::succeeding(), LONG);
    let err = h.executor.run(CLUSTER, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, DrsError::UnknownAlgorithm(_)));

    let config = ClusterDrsConfig { threshold: 1.5, ..cpu_config(0.1) };
    let h = harness(Some(config), two_host_cluster(), ScriptedMigrator::succeeding(), LONG);
    let err = h.executor.run(CLUSTER, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, DrsError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_balanced_cluster_needs_no_action() {
    let snap = snapshot(
        vec![host(1, 100, 50), host(2, 100, 50)],
        vec![workload(10, 1, 10), workload(11, 2, 10)],
    );
    let migrator = ScriptedMigrator::succeeding();
    let h = harness(Some(cpu_config(0.1)), snap, migrator.clone(), LONG);

    let report = h.executor.run(CLUSTER, &CancellationToken::new()).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::NoActionNeeded);
    assert!(!report.imbalance_detected);
    assert!(migrator.calls().is_empty());
}

#[tokio::test]
async fn test_zero_utilization_cannot_be_evaluated() {
    let snap = snapshot(vec![host(1, 100, 0), host(2, 100, 0)], vec![workload(10, 1, 0)]);
    let h = harness(Some(cpu_config(0.1)), snap, ScriptedMigrator::succeeding(), LONG);

    let report = h.executor.run(CLUSTER, &CancellationToken::new()).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::CannotEvaluate);
    assert!(report.moves.is_empty());
}

#[tokio::test]
async fn test_no_feasible_move_reports_no_improvement() {
    let mut w = workload(10, 1, 10);
    w.requires_storage_motion = true;
    w.storage_tag = Some("pool-a".to_string());
    let snap = snapshot(vec![host(1, 100, 80), host(2, 100, 20)], vec![w]);
    let migrator = ScriptedMigrator::succeeding();
    let h = harness(Some(cpu_config(0.1)), snap, migrator.clone(), LONG);

    let report = h.executor.run(CLUSTER, &CancellationToken::new()).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::NoImprovement);
    assert!(report.imbalance_detected);
    assert_eq!(report.detail.as_deref(), Some("no further improvement possible"));
    assert!(migrator.calls().is_empty());
}

#[tokio::test]
async fn test_scenario_run_completes_one_move() {
    let migrator = ScriptedMigrator::succeeding();
    let h = harness(Some(cpu_config(0.1)), two_host_cluster(), migrator.clone(), LONG);

    let report = h.executor.run(CLUSTER, &CancellationToken::new()).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.moves.len(), 1);
    assert_eq!(report.moves[0].status, MoveStatus::Succeeded);
    assert_eq!(migrator.calls(), vec![(10, 2, false)]);
    assert!(report.finished_at.is_some());
    assert_eq!(report.algorithm.as_deref(), Some("condensed"));
}

#[tokio::test]
async fn test_first_failure_skips_remaining_moves() {
    let migrator = ScriptedMigrator::failing_with(&[Some(MigrationErrorKind::ResourceUnavailable)]);
    let h = harness(Some(three_move_config()), three_move_cluster(), migrator.clone(), LONG);

    let report = h.executor.run(CLUSTER, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::PartiallyFailed);
    assert_eq!(report.moves.len(), 3);
    assert_eq!(report.moves[0].status, MoveStatus::Failed);
    assert_eq!(report.moves[0].error_kind, Some(MigrationErrorKind::ResourceUnavailable));
    for skipped in &report.moves[1..] {
        assert_eq!(skipped.status, MoveStatus::Skipped);
        assert_eq!(skipped.detail.as_deref(), Some(SKIPPED_PRIOR_FAILURE));
        assert_eq!(skipped.error_kind, None);
    }
    assert_eq!(migrator.calls().len(), 1);
}

#[tokio::test]
async fn test_all_moves_succeed_in_order() {
    let migrator = ScriptedMigrator::succeeding();
    let h = harness(Some(three_move_config()), three_move_cluster(), migrator.clone(), LONG);

    let report = h.executor.run(CLUSTER, &CancellationToken::new()).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.count(MoveStatus::Succeeded), 3);
    let orders: Vec<u32> = report.moves.iter().map(|m| m.order).collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert_eq!(migrator.calls(), vec![(101, 2, false), (102, 2, false), (103, 2, false)]);
}

#[tokio::test]
async fn test_slow_migration_times_out() {
    let migrator = ScriptedMigrator::slow(Duration::from_secs(10));
    let h = harness(
        Some(three_move_config()),
        three_move_cluster(),
        migrator.clone(),
        Duration::from_millis(50),
    );

    let report = h.executor.run(CLUSTER, &CancellationToken::new()).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::PartiallyFailed);
    assert_eq!(report.moves[0].status, MoveStatus::Failed);
    assert_eq!(report.moves[0].error_kind, Some(MigrationErrorKind::OperationTimedOut));
    assert_eq!(report.count(MoveStatus::Skipped), 2);
}

#[tokio::test]
async fn test_cancel_takes_effect_between_moves() {
    let cancel = CancellationToken::new();
    let migrator = ScriptedMigrator::cancelling(cancel.clone());
    let h = harness(Some(three_move_config()), three_move_cluster(), migrator.clone(), LONG);

    let report = h.executor.run(CLUSTER, &cancel).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Cancelled);
    // The in-flight move is allowed to finish.
    assert_eq!(report.moves[0].status, MoveStatus::Succeeded);
    for skipped in &report.moves[1..] {
        assert_eq!(skipped.status, MoveStatus::Skipped);
        assert_eq!(skipped.detail.as_deref(), Some(SKIPPED_CANCELLED));
    }
    assert_eq!(migrator.calls().len(), 1);
}

#[tokio::test]
async fn test_run_log_holds_final_report() {
    let migrator = ScriptedMigrator::failing_with(&[None, Some(MigrationErrorKind::ConcurrentOperation)]);
    let h = harness(Some(three_move_config()), three_move_cluster(), migrator, LONG);

    let report = h.executor.run(CLUSTER, &CancellationToken::new()).await.unwrap();
    let logged = h.run_log.run(report.run_id).unwrap();
    assert_eq!(logged, report);
    assert_eq!(h.run_log.move_saves(), 3);
    assert_eq!(
        logged.moves.iter().map(|m| m.status).collect::<Vec<_>>(),
        vec![MoveStatus::Succeeded, MoveStatus::Failed, MoveStatus::Skipped]
    );
}

#[tokio::test]
async fn test_run_publishes_lifecycle_events() {
    let h = harness(
        Some(cpu_config(0.1)),
        two_host_cluster(),
        ScriptedMigrator::succeeding(),
        LONG,
    );
    let mut rx = h.events.subscribe();

    let report = h.executor.run(CLUSTER, &CancellationToken::new()).await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.event_type());
        if let Event::RunComplete { run_id, outcome, moves_succeeded, .. } = event {
            assert_eq!(run_id, report.run_id);
            assert_eq!(outcome, RunOutcome::Completed);
            assert_eq!(moves_succeeded, 1);
        }
    }
    assert_eq!(
        kinds,
        vec!["run_started", "imbalance_evaluated", "plan_ready", "move_complete", "run_complete"]
    );
}

#[tokio::test]
async fn test_preview_does_not_migrate() {
    let migrator = ScriptedMigrator::succeeding();
    let h = harness(Some(cpu_config(0.1)), two_host_cluster(), migrator.clone(), LONG);

    let preview = h.executor.preview(CLUSTER).unwrap();
    assert!(preview.reading.needs_rebalancing);
    assert_eq!(preview.plan.unwrap().moves.len(), 1);
    assert!(migrator.calls().is_empty());
    assert_eq!(h.run_log.run_count(), 0);
}
