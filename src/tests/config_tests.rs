use crate::balancer::MetricSelection;
use crate::config::{AppConfig, ClusterDrsConfig};
use crate::error::DrsError;

#[test]
fn test_parse_ini() {
    let mut config = AppConfig::default();
    let ini = r#"
# daemon settings
PORT="7100"
TICK_SECONDS="30"
MIGRATION_TIMEOUT_SECS="600"
MIGRATE_COMMAND="/opt/drs/migrate.sh"
DEFAULT_ALGORITHM="balanced"
DEFAULT_THRESHOLD="0.3"
DEFAULT_METRIC="both"
DEFAULT_INTERVAL_MINUTES="15"
DEFAULT_ITERATION_FRACTION="0.1"
UNKNOWN_KEY="ignored"
"#;
    config.parse_ini(ini);
    assert_eq!(config.port, 7100);
    assert_eq!(config.tick_seconds, 30);
    assert_eq!(config.migration_timeout_secs, 600);
    assert_eq!(config.migrate_command, "/opt/drs/migrate.sh");
    assert_eq!(config.cluster_defaults.algorithm, "balanced");
    assert!((config.cluster_defaults.threshold - 0.3).abs() < f64::EPSILON);
    assert_eq!(config.cluster_defaults.metric, MetricSelection::Both);
    assert_eq!(config.cluster_defaults.interval_minutes, 15);
    assert!((config.cluster_defaults.iteration_fraction - 0.1).abs() < f64::EPSILON);
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_ini_keeps_defaults_on_bad_values() {
    let mut config = AppConfig::default();
    config.parse_ini("PORT=\"not-a-port\"\nDEFAULT_METRIC=\"disk\"\n");
    assert_eq!(config.port, AppConfig::default().port);
    assert_eq!(config.cluster_defaults.metric, MetricSelection::Memory);
}

#[test]
fn test_default_config_validates() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.tick_interval().as_secs(), 60);
    assert_eq!(config.migration_timeout().as_secs(), 1800);
}

#[test]
fn test_invalid_defaults_fail_validation() {
    let mut config = AppConfig::default();
    config.cluster_defaults.algorithm = "bogus".into();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.tick_seconds = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_cluster_config_defaults() {
    let config = ClusterDrsConfig::default();
    assert!(!config.enabled);
    assert_eq!(config.algorithm, "condensed");
    assert!(config.validate().is_ok());
}

#[test]
fn test_max_iterations_rounds_with_floor_of_one() {
    let config = ClusterDrsConfig { iteration_fraction: 0.2, ..ClusterDrsConfig::default() };
    assert_eq!(config.max_iterations(0), 1);
    assert_eq!(config.max_iterations(2), 1);
    assert_eq!(config.max_iterations(8), 2);
    assert_eq!(config.max_iterations(13), 3);
    assert_eq!(config.max_iterations(100), 20);
}

#[test]
fn test_cluster_config_ranges() {
    let bad = [
        ClusterDrsConfig { iteration_fraction: 1.5, ..ClusterDrsConfig::default() },
        ClusterDrsConfig { threshold: -0.1, ..ClusterDrsConfig::default() },
        ClusterDrsConfig { interval_minutes: 0, ..ClusterDrsConfig::default() },
        ClusterDrsConfig { memory_overprovisioning: 0.0, ..ClusterDrsConfig::default() },
    ];
    for config in bad {
        assert!(matches!(config.validate(), Err(DrsError::InvalidConfig(_))), "{config:?}");
    }
}
