use super::optional_ext::OptionalExt;
use super::Database;
use crate::balancer::{ClusterId, MetricSelection};
use crate::config::ClusterDrsConfig;
use anyhow::Result;
use rusqlite::{params, Row};

const CONFIG_COLUMNS: &str = "enabled, interval_minutes, iteration_fraction, algorithm, \
     threshold, metric, cpu_overprovisioning, memory_overprovisioning";

fn map_config_row(row: &Row<'_>) -> rusqlite::Result<ClusterDrsConfig> {
    let metric_str: String = row.get(5)?;
    let metric = MetricSelection::try_from(metric_str.as_str()).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::from(e))
    })?;
    Ok(ClusterDrsConfig {
        enabled: row.get(0)?,
        interval_minutes: row.get(1)?,
        iteration_fraction: row.get(2)?,
        algorithm: row.get(3)?,
        threshold: row.get(4)?,
        metric,
        cpu_overprovisioning: row.get(6)?,
        memory_overprovisioning: row.get(7)?,
    })
}

impl Database {
    /// DRS config for a cluster, or `None` if it was never configured.
    pub(crate) fn get_drs_config(&self, cluster_id: ClusterId) -> Result<Option<ClusterDrsConfig>> {
        let conn = self.conn();
        let config = conn
            .query_row(
                &format!("SELECT {CONFIG_COLUMNS} FROM cluster_drs_config WHERE cluster_id = ?1"),
                params![cluster_id],
                map_config_row,
            )
            .optional()?;
        Ok(config)
    }

    /// Insert or replace the DRS config for a cluster.
    pub(crate) fn upsert_drs_config(&self, cluster_id: ClusterId, config: &ClusterDrsConfig) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO cluster_drs_config \
             (cluster_id, enabled, interval_minutes, iteration_fraction, algorithm, threshold, \
              metric, cpu_overprovisioning, memory_overprovisioning, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, strftime('%Y-%m-%dT%H:%M:%fZ','now')) \
             ON CONFLICT(cluster_id) DO UPDATE SET \
               enabled = excluded.enabled, \
               interval_minutes = excluded.interval_minutes, \
               iteration_fraction = excluded.iteration_fraction, \
               algorithm = excluded.algorithm, \
               threshold = excluded.threshold, \
               metric = excluded.metric, \
               cpu_overprovisioning = excluded.cpu_overprovisioning, \
               memory_overprovisioning = excluded.memory_overprovisioning, \
               updated_at = excluded.updated_at",
            params![
                cluster_id,
                config.enabled,
                config.interval_minutes,
                config.iteration_fraction,
                config.algorithm,
                config.threshold,
                config.metric.as_str(),
                config.cpu_overprovisioning,
                config.memory_overprovisioning,
            ],
        )?;
        Ok(())
    }

    /// Ids of clusters that have a DRS config row, enabled or not.
    pub(crate) fn drs_cluster_ids(&self) -> Result<Vec<ClusterId>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT cluster_id FROM cluster_drs_config ORDER BY cluster_id")?;
        let ids = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}
