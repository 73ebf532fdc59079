use super::support::{
    cpu_config, three_move_cluster, three_move_config, two_host_cluster, FakeProvider,
    MemoryRunLog, ScriptedMigrator, CLUSTER,
};
use crate::config::ClusterDrsConfig;
use crate::coordinator::{ClusterRunState, DrsScheduleCoordinator};
use crate::error::DrsError;
use crate::events::EventHub;
use crate::executor::{DrsExecutor, MoveStatus, RunOutcome, SKIPPED_ABORTED};
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn coordinator(
    config: Option<ClusterDrsConfig>,
    migrator: Arc<ScriptedMigrator>,
) -> (Arc<DrsScheduleCoordinator>, Arc<FakeProvider>, Arc<MemoryRunLog>) {
    let provider = FakeProvider::new(config, three_move_cluster());
    let run_log = Arc::new(MemoryRunLog::default());
    let executor = Arc::new(DrsExecutor::new(
        provider.clone(),
        migrator,
        run_log.clone(),
        EventHub::new(64),
        Duration::from_secs(30),
    ));
    let coordinator = Arc::new(DrsScheduleCoordinator::new(executor, Duration::from_secs(60)));
    (coordinator, provider, run_log)
}

fn state_of(coord: &DrsScheduleCoordinator, cluster_id: i64) -> ClusterRunState {
    coord
        .statuses()
        .into_iter()
        .find(|s| s.cluster_id == cluster_id)
        .map_or(ClusterRunState::Idle, |s| s.state)
}

/// Poll until `check` holds, failing the test after two seconds.
async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_concurrent_trigger_is_rejected() {
    let gate = Arc::new(Notify::new());
    let migrator = ScriptedMigrator::gated(gate.clone());
    let (coord, _, _) = coordinator(Some(three_move_config()), migrator.clone());

    let first = {
        let coord = coord.clone();
        tokio::spawn(async move { coord.execute_now(CLUSTER).await })
    };
    wait_until(|| migrator.entered() == 1).await;
    assert_eq!(state_of(&coord, CLUSTER), ClusterRunState::Running);

    let second = coord.execute_now(CLUSTER).await;
    assert_eq!(second.unwrap_err(), DrsError::AlreadyRunning(CLUSTER));

    // Release the three gated migrations one at a time.
    while !first.is_finished() {
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let report = first.await.unwrap().unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(state_of(&coord, CLUSTER), ClusterRunState::Idle);
    assert_eq!(migrator.calls().len(), 3);
}

#[tokio::test]
async fn test_cluster_returns_to_idle_after_run() {
    let (coord, _, _) = coordinator(Some(cpu_config(0.1)), ScriptedMigrator::succeeding());
    let report = coord.execute_now(CLUSTER).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);

    let statuses = coord.statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].state, ClusterRunState::Idle);
    assert_eq!(statuses[0].last_outcome, Some(RunOutcome::Completed));
    assert!(statuses[0].last_run.is_some());

    // A second on-demand run is fine once the first has finished.
    assert!(coord.execute_now(CLUSTER).await.is_ok());
}

#[tokio::test]
async fn test_load_error_becomes_failed_report() {
    let (coord, _, run_log) = coordinator(None, ScriptedMigrator::succeeding());
    let report = coord.execute_now(CLUSTER).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert!(report.detail.unwrap().contains("no DRS configuration"));
    assert_eq!(state_of(&coord, CLUSTER), ClusterRunState::Idle);
    assert_eq!(run_log.run_count(), 1);
}

#[tokio::test]
async fn test_panicking_run_fails_its_own_record() {
    let (coord, _, run_log) = coordinator(Some(three_move_config()), ScriptedMigrator::panicking());
    let report = coord.execute_now(CLUSTER).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.detail.as_deref(), Some("DRS run panicked"));
    assert_eq!(state_of(&coord, CLUSTER), ClusterRunState::Idle);

    // The run persisted before the panic is finished in place, not duplicated.
    assert_eq!(run_log.run_count(), 1);
    let stored = run_log.run(report.run_id).unwrap();
    assert_eq!(stored.outcome, RunOutcome::Failed);
    assert!(stored.finished_at.is_some());
    assert_eq!(stored.moves.len(), 3);
    assert!(stored
        .moves
        .iter()
        .all(|m| m.status == MoveStatus::Skipped && m.detail.as_deref() == Some(SKIPPED_ABORTED)));
}

#[tokio::test]
async fn test_tick_starts_due_clusters_and_skips_running_ones() {
    let gate = Arc::new(Notify::new());
    let migrator = ScriptedMigrator::gated(gate.clone());
    let (coord, provider, _) = coordinator(Some(three_move_config()), migrator.clone());
    *provider.snapshot.lock().unwrap() = two_host_cluster();

    let now = Utc::now();
    assert_eq!(coord.tick(now), vec![CLUSTER]);
    wait_until(|| migrator.entered() == 1).await;

    // Still running: skipped even though the interval has long passed.
    assert!(coord.tick(now + ChronoDuration::hours(5)).is_empty());

    gate.notify_one();
    wait_until(|| state_of(&coord, CLUSTER) == ClusterRunState::Idle).await;

    // Idle but not yet due.
    assert!(coord.tick(now + ChronoDuration::minutes(1)).is_empty());
    // Due again.
    assert_eq!(coord.tick(now + ChronoDuration::hours(2)), vec![CLUSTER]);
    gate.notify_one();
    wait_until(|| state_of(&coord, CLUSTER) == ClusterRunState::Idle).await;
}

#[tokio::test]
async fn test_tick_ignores_disabled_clusters() {
    let config = ClusterDrsConfig { enabled: false, ..cpu_config(0.1) };
    let migrator = ScriptedMigrator::succeeding();
    let (coord, _, run_log) = coordinator(Some(config), migrator.clone());

    assert!(coord.tick(Utc::now()).is_empty());
    assert_eq!(run_log.run_count(), 0);
    assert!(migrator.calls().is_empty());
}

#[tokio::test]
async fn test_tick_survives_missing_config() {
    let (coord, _, _) = coordinator(None, ScriptedMigrator::succeeding());
    assert!(coord.tick(Utc::now()).is_empty());
}

#[tokio::test]
async fn test_cancel_reaches_in_flight_run() {
    let gate = Arc::new(Notify::new());
    let migrator = ScriptedMigrator::gated(gate.clone());
    let (coord, _, _) = coordinator(Some(three_move_config()), migrator.clone());

    assert!(!coord.cancel(CLUSTER));

    let run = {
        let coord = coord.clone();
        tokio::spawn(async move { coord.execute_now(CLUSTER).await })
    };
    wait_until(|| migrator.entered() == 1).await;
    assert!(coord.cancel(CLUSTER));
    gate.notify_one();

    let report = run.await.unwrap().unwrap();
    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(migrator.calls().len(), 1);
}

#[tokio::test]
async fn test_shutdown_stops_the_ticker() {
    let (coord, _, _) = coordinator(None, ScriptedMigrator::succeeding());
    let handle = coord.spawn();
    coord.shutdown();
    tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
}
