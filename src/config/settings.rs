use super::cluster::ClusterDrsConfig;
use super::defaults::{
    DEFAULT_CONFIG_PATH, DEFAULT_DB_PATH, DEFAULT_MIGRATE_COMMAND, DEFAULT_MIGRATION_TIMEOUT_SECS,
    DEFAULT_PORT, DEFAULT_TICK_SECONDS,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AppConfig {
    pub port: u16,
    pub db_path: String,
    pub config_path: String,
    /// Seconds between coordinator ticks.
    pub tick_seconds: u64,
    /// Bounded wait for a single migration.
    pub migration_timeout_secs: u64,
    /// Executable invoked as `<cmd> <workload_id> <destination_host_id> <live|storage>`.
    pub migrate_command: String,
    /// Settings applied to a cluster the first time its DRS config is written.
    pub cluster_defaults: ClusterDrsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_path: DEFAULT_DB_PATH.to_string(),
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            tick_seconds: DEFAULT_TICK_SECONDS,
            migration_timeout_secs: DEFAULT_MIGRATION_TIMEOUT_SECS,
            migrate_command: DEFAULT_MIGRATE_COMMAND.to_string(),
            cluster_defaults: ClusterDrsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration, merging defaults with env overrides and config file values.
    pub(crate) fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("DRS_CONFIG_PATH") {
            config.config_path = path;
        }
        if let Ok(path) = std::env::var("DRS_DB_PATH") {
            config.db_path = path;
        }
        if let Ok(port) = std::env::var("DRS_PORT") {
            config.port = port.parse().context("DRS_PORT must be a valid port number")?;
        }
        if let Ok(cmd) = std::env::var("DRS_MIGRATE_COMMAND") {
            config.migrate_command = cmd;
        }

        let cfg_path = Path::new(&config.config_path);
        if cfg_path.exists() {
            let contents = fs::read_to_string(cfg_path)
                .with_context(|| format!("Failed to read config file: {}", config.config_path))?;
            config.parse_ini(&contents);
        }

        config.validate()?;
        Ok(config)
    }

    pub(crate) const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_seconds)
    }

    pub(crate) const fn migration_timeout(&self) -> Duration {
        Duration::from_secs(self.migration_timeout_secs)
    }
}
