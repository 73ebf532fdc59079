use super::settings::AppConfig;
use crate::balancer::Algorithm;
use anyhow::Result;

impl AppConfig {
    /// Validate configuration values are sane.
    pub(crate) fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.port > 0, "Port must be > 0");
        anyhow::ensure!(self.tick_seconds >= 1, "tick_seconds must be at least 1");
        anyhow::ensure!(
            self.migration_timeout_secs >= 1,
            "migration_timeout_secs must be at least 1"
        );
        anyhow::ensure!(!self.migrate_command.trim().is_empty(), "migrate_command must be set");
        Algorithm::from_name(&self.cluster_defaults.algorithm)?;
        self.cluster_defaults.validate()?;
        Ok(())
    }
}
