use crate::balancer::{ClusterId, HostId, WorkloadId};
use crate::error::MigrationErrorKind;
use crate::executor::{MoveStatus, RunOutcome};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events that flow from DRS runs to SSE subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub(crate) enum Event {
    /// A run has loaded its inputs and begun evaluating the cluster.
    RunStarted { cluster_id: ClusterId, run_id: Uuid },

    /// The cluster's imbalance was measured.
    ImbalanceEvaluated {
        cluster_id: ClusterId,
        cpu: Option<f64>,
        memory: Option<f64>,
        threshold: f64,
        needs_rebalancing: bool,
    },

    /// A plan has been computed and is about to be executed.
    PlanReady {
        cluster_id: ClusterId,
        run_id: Uuid,
        total_moves: u32,
        projected_imbalance: Option<f64>,
    },

    /// A single migration attempt finished (or was skipped).
    MoveComplete {
        run_id: Uuid,
        order: u32,
        workload_id: WorkloadId,
        destination_host_id: HostId,
        status: MoveStatus,
        error_kind: Option<MigrationErrorKind>,
    },

    /// The run has finished.
    RunComplete {
        cluster_id: ClusterId,
        run_id: Uuid,
        outcome: RunOutcome,
        moves_succeeded: u32,
        moves_failed: u32,
        moves_skipped: u32,
        duration_seconds: f64,
    },

    /// A generic error event.
    DaemonError { message: String },
}

impl Event {
    /// Returns the SSE event type name for this event variant.
    pub(crate) const fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::ImbalanceEvaluated { .. } => "imbalance_evaluated",
            Self::PlanReady { .. } => "plan_ready",
            Self::MoveComplete { .. } => "move_complete",
            Self::RunComplete { .. } => "run_complete",
            Self::DaemonError { .. } => "daemon_error",
        }
    }
}

/// The central event broadcast hub.
///
/// Runs publish here via `publish()`. SSE handlers subscribe via
/// `subscribe()` and forward events to the client.
#[derive(Debug, Clone)]
pub(crate) struct EventHub {
    sender: broadcast::Sender<Event>,
}

impl EventHub {
    /// Create a new EventHub with the given channel capacity.
    ///
    /// Subscribers that fall more than `capacity` events behind receive a
    /// `Lagged` error and miss intermediate events.
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Events are fire-and-forget: having no subscribers is not an error.
    pub(crate) fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to the event stream. Returns a broadcast Receiver.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}
