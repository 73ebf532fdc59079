//! Cluster builders and in-memory collaborators shared by the tests.

use crate::balancer::{ClusterId, ClusterSnapshot, HostId, HostView, MetricSelection, WorkloadId, WorkloadView};
use crate::config::ClusterDrsConfig;
use crate::error::{DrsError, MigrationErrorKind, MigrationFailure};
use crate::executor::{
    DrsRunReport, MigrationCapability, MoveRecord, RunLog, RunOutcome, SnapshotProvider,
};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub(crate) const CLUSTER: ClusterId = 1;
pub(crate) const GIB: u64 = 1024 * 1024 * 1024;

pub(crate) fn host(id: HostId, cpu_total: u64, cpu_used: u64) -> HostView {
    HostView {
        id,
        name: format!("host-{id}"),
        hypervisor: "kvm".to_string(),
        cpu_total_mhz: cpu_total,
        cpu_used_mhz: cpu_used,
        memory_total_bytes: 64 * GIB,
        memory_used_bytes: 0,
        workloads: BTreeSet::new(),
        avoid: false,
        host_tags: BTreeSet::new(),
        storage_tags: BTreeSet::new(),
    }
}

pub(crate) fn workload(id: WorkloadId, host_id: HostId, cpu: u64) -> WorkloadView {
    WorkloadView {
        id,
        name: format!("vm-{id}"),
        cpu_mhz: cpu,
        memory_bytes: GIB,
        host_id,
        requires_storage_motion: false,
        storage_tag: None,
        host_tag: None,
        pinned: false,
    }
}

/// Assemble a snapshot, filling each host's workload set and adding the
/// workloads' memory to its host's used memory.
pub(crate) fn snapshot(mut hosts: Vec<HostView>, workloads: Vec<WorkloadView>) -> ClusterSnapshot {
    for w in &workloads {
        if let Some(h) = hosts.iter_mut().find(|h| h.id == w.host_id) {
            h.workloads.insert(w.id);
            h.memory_used_bytes += w.memory_bytes;
        }
    }
    ClusterSnapshot::new(CLUSTER, hosts, workloads).unwrap()
}

pub(crate) fn cpu_config(threshold: f64) -> ClusterDrsConfig {
    ClusterDrsConfig {
        enabled: true,
        threshold,
        metric: MetricSelection::Cpu,
        algorithm: "condensed".to_string(),
        ..ClusterDrsConfig::default()
    }
}

/// Host A at 80% cpu with one movable 10-cpu workload, host B at 20%.
pub(crate) fn two_host_cluster() -> ClusterSnapshot {
    snapshot(vec![host(1, 100, 80), host(2, 100, 20)], vec![workload(10, 1, 10)])
}

/// Host A at 90% cpu with six 15-cpu workloads, host B empty. Three moves
/// level it out.
pub(crate) fn three_move_cluster() -> ClusterSnapshot {
    let workloads = (1..=6).map(|i| workload(100 + i, 1, 15)).collect();
    snapshot(vec![host(1, 100, 90), host(2, 100, 0)], workloads)
}

pub(crate) fn three_move_config() -> ClusterDrsConfig {
    ClusterDrsConfig { iteration_fraction: 1.0, ..cpu_config(0.1) }
}

pub(crate) struct FakeProvider {
    pub config: Mutex<Option<ClusterDrsConfig>>,
    pub snapshot: Mutex<ClusterSnapshot>,
}

impl FakeProvider {
    pub(crate) fn new(config: Option<ClusterDrsConfig>, snapshot: ClusterSnapshot) -> Arc<Self> {
        Arc::new(Self { config: Mutex::new(config), snapshot: Mutex::new(snapshot) })
    }
}

impl SnapshotProvider for FakeProvider {
    fn cluster_config(&self, cluster_id: ClusterId) -> Result<ClusterDrsConfig, DrsError> {
        self.config.lock().unwrap().clone().ok_or(DrsError::ConfigNotFound(cluster_id))
    }

    fn cluster_snapshot(&self, _cluster_id: ClusterId) -> Result<ClusterSnapshot, DrsError> {
        Ok(self.snapshot.lock().unwrap().clone())
    }

    fn drs_clusters(&self) -> Result<Vec<ClusterId>, DrsError> {
        Ok(vec![CLUSTER])
    }
}

/// Migration capability that replays a script of results. Once the script
/// runs out every call succeeds.
#[derive(Default)]
pub(crate) struct ScriptedMigrator {
    script: Mutex<VecDeque<Option<MigrationErrorKind>>>,
    calls: Mutex<Vec<(WorkloadId, HostId, bool)>>,
    entered: AtomicUsize,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
    cancel_on_first: Option<CancellationToken>,
    panics: bool,
}

impl ScriptedMigrator {
    pub(crate) fn succeeding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn failing_with(kinds: &[Option<MigrationErrorKind>]) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(kinds.iter().copied().collect()), ..Self::default() })
    }

    pub(crate) fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay: Some(delay), ..Self::default() })
    }

    /// Every call waits for `gate` to be notified.
    pub(crate) fn gated(gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self { gate: Some(gate), ..Self::default() })
    }

    /// Cancels `token` while the first migration is in flight.
    pub(crate) fn cancelling(token: CancellationToken) -> Arc<Self> {
        Arc::new(Self { cancel_on_first: Some(token), ..Self::default() })
    }

    /// Panics inside the first migration.
    pub(crate) fn panicking() -> Arc<Self> {
        Arc::new(Self { panics: true, ..Self::default() })
    }

    pub(crate) fn calls(&self) -> Vec<(WorkloadId, HostId, bool)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MigrationCapability for ScriptedMigrator {
    async fn migrate(
        &self,
        workload_id: WorkloadId,
        destination_host_id: HostId,
        requires_storage_motion: bool,
    ) -> Result<(), MigrationFailure> {
        let first = self.entered.fetch_add(1, Ordering::SeqCst) == 0;
        self.calls.lock().unwrap().push((workload_id, destination_host_id, requires_storage_motion));

        if first {
            if let Some(token) = &self.cancel_on_first {
                token.cancel();
            }
        }
        assert!(!self.panics, "migration helper crashed");
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap().pop_front().flatten();
        match next {
            Some(kind) => Err(MigrationFailure::new(
                kind,
                workload_id,
                destination_host_id,
                format!("scripted {kind}"),
            )),
            None => Ok(()),
        }
    }
}

/// Run log kept in memory; the latest save of each run and move wins.
#[derive(Default)]
pub(crate) struct MemoryRunLog {
    runs: Mutex<HashMap<Uuid, DrsRunReport>>,
    move_saves: AtomicUsize,
}

impl MemoryRunLog {
    pub(crate) fn run(&self, run_id: Uuid) -> Option<DrsRunReport> {
        self.runs.lock().unwrap().get(&run_id).cloned()
    }

    pub(crate) fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    pub(crate) fn move_saves(&self) -> usize {
        self.move_saves.load(Ordering::SeqCst)
    }
}

impl RunLog for MemoryRunLog {
    fn save_run(&self, report: &DrsRunReport) -> anyhow::Result<()> {
        self.runs.lock().unwrap().insert(report.run_id, report.clone());
        Ok(())
    }

    fn save_move(&self, run_id: Uuid, record: &MoveRecord) -> anyhow::Result<()> {
        self.move_saves.fetch_add(1, Ordering::SeqCst);
        let mut runs = self.runs.lock().unwrap();
        let run = runs.get_mut(&run_id).ok_or_else(|| anyhow::anyhow!("unknown run {run_id}"))?;
        if let Some(existing) = run.moves.iter_mut().find(|m| m.order == record.order) {
            *existing = record.clone();
        }
        Ok(())
    }

    fn unfinished_run(&self, cluster_id: ClusterId) -> anyhow::Result<Option<DrsRunReport>> {
        let runs = self.runs.lock().unwrap();
        Ok(runs
            .values()
            .filter(|r| r.cluster_id == cluster_id && r.outcome == RunOutcome::Running)
            .max_by_key(|r| r.started_at)
            .cloned())
    }
}
