use crate::balancer::MetricSelection;

/// Default path of the daemon config file.
pub(super) const DEFAULT_CONFIG_PATH: &str = "/etc/cluster-drs/cluster-drs.cfg";

/// Default path for the SQLite database holding inventory, cluster config and run history.
pub(super) const DEFAULT_DB_PATH: &str = "/var/lib/cluster-drs/drs.db";

/// Default port the daemon listens on (localhost only).
pub(super) const DEFAULT_PORT: u16 = 7092;

/// How often the coordinator looks for clusters that are due, in seconds.
pub(super) const DEFAULT_TICK_SECONDS: u64 = 60;

/// Upper bound on a single live migration before it counts as timed out (30 minutes).
pub(super) const DEFAULT_MIGRATION_TIMEOUT_SECS: u64 = 1800;

/// Command invoked to perform one migration.
pub(super) const DEFAULT_MIGRATE_COMMAND: &str = "/usr/libexec/cluster-drs/migrate";

/// Scoring algorithm used when a cluster does not name one.
pub(super) const DEFAULT_ALGORITHM: &str = "condensed";

/// Imbalance (coefficient of variation) above which a cluster is rebalanced.
pub(super) const DEFAULT_THRESHOLD: f64 = 0.5;

pub(super) const DEFAULT_METRIC: MetricSelection = MetricSelection::Memory;

/// Minutes between scheduled runs of one cluster.
pub(super) const DEFAULT_INTERVAL_MINUTES: u32 = 60;

/// Fraction of a cluster's workloads that one run may move.
pub(super) const DEFAULT_ITERATION_FRACTION: f64 = 0.2;
