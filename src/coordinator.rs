//! Periodic and on-demand triggering of DRS runs.
//!
//! Each cluster is either `Idle` or `Running`. The transition to `Running` is
//! a compare-and-set under one mutex, so a cluster never has two runs in
//! flight; scheduled ticks skip a busy cluster and on-demand triggers get
//! `AlreadyRunning` back immediately.

use crate::balancer::ClusterId;
use crate::error::DrsError;
use crate::events::Event;
use crate::executor::{DrsExecutor, DrsRunReport, MoveStatus, RunOutcome, SKIPPED_ABORTED};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ClusterRunState {
    Idle,
    Running,
}

#[derive(Debug)]
struct ClusterSlot {
    state: ClusterRunState,
    last_run: Option<DateTime<Utc>>,
    last_outcome: Option<RunOutcome>,
    cancel: Option<CancellationToken>,
}

impl ClusterSlot {
    const fn idle() -> Self {
        Self { state: ClusterRunState::Idle, last_run: None, last_outcome: None, cancel: None }
    }
}

/// Per-cluster state as shown by the status API.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ClusterStatus {
    pub cluster_id: ClusterId,
    pub state: ClusterRunState,
    pub last_run: Option<DateTime<Utc>>,
    pub last_outcome: Option<RunOutcome>,
}

pub(crate) struct DrsScheduleCoordinator {
    executor: Arc<DrsExecutor>,
    slots: Mutex<HashMap<ClusterId, ClusterSlot>>,
    tick: Duration,
    shutdown: CancellationToken,
}

/// Returns the cluster to `Idle` however the run ends, panics included.
struct RunGuard {
    coordinator: Arc<DrsScheduleCoordinator>,
    cluster_id: ClusterId,
    outcome: Option<RunOutcome>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.coordinator.release(self.cluster_id, self.outcome);
    }
}

impl DrsScheduleCoordinator {
    pub(crate) fn new(executor: Arc<DrsExecutor>, tick: Duration) -> Self {
        Self {
            executor,
            slots: Mutex::new(HashMap::new()),
            tick,
            shutdown: CancellationToken::new(),
        }
    }

    pub(crate) fn executor(&self) -> &Arc<DrsExecutor> {
        &self.executor
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ClusterId, ClusterSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Idle -> Running, only if the cluster is idle and `due` accepts its
    /// last run time.
    fn try_acquire(
        &self,
        cluster_id: ClusterId,
        now: DateTime<Utc>,
        due: impl FnOnce(Option<DateTime<Utc>>) -> bool,
    ) -> Result<Option<CancellationToken>, DrsError> {
        let mut slots = self.slots();
        let slot = slots.entry(cluster_id).or_insert_with(ClusterSlot::idle);
        if slot.state == ClusterRunState::Running {
            return Err(DrsError::AlreadyRunning(cluster_id));
        }
        if !due(slot.last_run) {
            return Ok(None);
        }
        let token = self.shutdown.child_token();
        slot.state = ClusterRunState::Running;
        slot.last_run = Some(now);
        slot.cancel = Some(token.clone());
        Ok(Some(token))
    }

    fn release(&self, cluster_id: ClusterId, outcome: Option<RunOutcome>) {
        let mut slots = self.slots();
        let slot = slots.entry(cluster_id).or_insert_with(ClusterSlot::idle);
        slot.state = ClusterRunState::Idle;
        slot.cancel = None;
        slot.last_outcome = outcome.or(Some(RunOutcome::Failed));
    }

    pub(crate) fn statuses(&self) -> Vec<ClusterStatus> {
        let mut statuses: Vec<ClusterStatus> = self
            .slots()
            .iter()
            .map(|(&cluster_id, slot)| ClusterStatus {
                cluster_id,
                state: slot.state,
                last_run: slot.last_run,
                last_outcome: slot.last_outcome,
            })
            .collect();
        statuses.sort_by_key(|s| s.cluster_id);
        statuses
    }

    /// Run DRS on a cluster now. Fails fast with `AlreadyRunning` instead of
    /// queueing behind an in-flight run.
    pub(crate) async fn execute_now(
        self: &Arc<Self>,
        cluster_id: ClusterId,
    ) -> Result<DrsRunReport, DrsError> {
        let Some(token) = self.try_acquire(cluster_id, Utc::now(), |_| true)? else {
            return Err(DrsError::AlreadyRunning(cluster_id));
        };
        info!("On-demand DRS run requested for cluster {}", cluster_id);

        let handle = tokio::spawn(Arc::clone(self).run_cluster(cluster_id, token));
        match handle.await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("DRS task for cluster {} did not complete: {}", cluster_id, e);
                Ok(self.record_failure(cluster_id, "DRS run task aborted"))
            }
        }
    }

    /// Request cooperative cancellation of the cluster's in-flight run.
    pub(crate) fn cancel(&self, cluster_id: ClusterId) -> bool {
        let slots = self.slots();
        match slots.get(&cluster_id).and_then(|s| s.cancel.as_ref()) {
            Some(token) => {
                token.cancel();
                info!("Cancellation requested for cluster {}", cluster_id);
                true
            }
            None => false,
        }
    }

    /// One scheduler pass: start a run for every enabled, idle cluster whose
    /// interval has elapsed. Returns the clusters that were started.
    pub(crate) fn tick(self: &Arc<Self>, now: DateTime<Utc>) -> Vec<ClusterId> {
        let provider = self.executor.provider();
        let clusters = match provider.drs_clusters() {
            Ok(c) => c,
            Err(e) => {
                warn!("DRS tick: cannot list clusters: {}", e);
                return Vec::new();
            }
        };

        let mut started = Vec::new();
        for cluster_id in clusters {
            let config = match provider.cluster_config(cluster_id) {
                Ok(c) => c,
                Err(e) => {
                    warn!("DRS tick: cluster {}: {}", cluster_id, e);
                    continue;
                }
            };
            if !config.enabled {
                continue;
            }

            let interval = chrono::Duration::minutes(i64::from(config.interval_minutes));
            let due = |last: Option<DateTime<Utc>>| last.is_none_or(|t| now - t >= interval);

            match self.try_acquire(cluster_id, now, due) {
                Ok(Some(token)) => {
                    debug!("DRS tick: starting run for cluster {}", cluster_id);
                    tokio::spawn(Arc::clone(self).run_cluster(cluster_id, token));
                    started.push(cluster_id);
                }
                Ok(None) => {}
                Err(_) => debug!("DRS tick: cluster {} still running, skipping", cluster_id),
            }
        }
        started
    }

    /// Drive `tick` on a fixed interval until `shutdown` is called.
    pub(crate) fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("DRS coordinator started, tick every {}s", this.tick.as_secs());

            loop {
                tokio::select! {
                    () = this.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let result =
                            std::panic::catch_unwind(AssertUnwindSafe(|| this.tick(Utc::now())));
                        if result.is_err() {
                            error!("DRS tick panicked");
                        }
                    }
                }
            }

            info!("DRS coordinator stopped");
        })
    }

    /// Stop ticking and ask in-flight runs to stop at their next move boundary.
    pub(crate) fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn run_cluster(self: Arc<Self>, cluster_id: ClusterId, cancel: CancellationToken) -> DrsRunReport {
        let mut guard =
            RunGuard { coordinator: Arc::clone(&self), cluster_id, outcome: None };

        let result = AssertUnwindSafe(self.executor.run(cluster_id, &cancel)).catch_unwind().await;

        let report = match result {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                warn!("DRS run for cluster {} aborted: {}", cluster_id, e);
                self.record_failure(cluster_id, &e.to_string())
            }
            Err(_) => {
                error!("DRS run for cluster {} panicked!", cluster_id);
                self.fail_unfinished(cluster_id, "DRS run panicked")
            }
        };

        guard.outcome = Some(report.outcome);
        report
    }

    /// Close out the run a panicking executor left behind, or record a fresh
    /// failed run when it never got as far as persisting one.
    fn fail_unfinished(&self, cluster_id: ClusterId, message: &str) -> DrsRunReport {
        let mut report = match self.executor.run_log().unfinished_run(cluster_id) {
            Ok(Some(report)) => report,
            Ok(None) => return self.record_failure(cluster_id, message),
            Err(e) => {
                error!("Failed to load in-flight DRS run for cluster {}: {:#}", cluster_id, e);
                return self.record_failure(cluster_id, message);
            }
        };
        for record in report.moves.iter_mut().filter(|m| m.status == MoveStatus::Pending) {
            record.status = MoveStatus::Skipped;
            record.detail = Some(SKIPPED_ABORTED.to_string());
        }
        self.finish_failed(report, message)
    }

    fn record_failure(&self, cluster_id: ClusterId, message: &str) -> DrsRunReport {
        self.finish_failed(DrsRunReport::start(cluster_id), message)
    }

    fn finish_failed(&self, mut report: DrsRunReport, message: &str) -> DrsRunReport {
        let cluster_id = report.cluster_id;
        report.finish(RunOutcome::Failed, Some(message.to_string()));
        if let Err(e) = self.executor.run_log().save_run(&report) {
            error!("Failed to persist failed DRS run for cluster {}: {:#}", cluster_id, e);
        }
        self.executor.event_hub().publish(Event::DaemonError {
            message: format!("DRS run for cluster {cluster_id} failed: {message}"),
        });
        report
    }
}
