use super::models::{Cluster, Inventory};
use super::optional_ext::OptionalExt;
use super::Database;
use crate::balancer::{ClusterId, ClusterSnapshot, HostId, HostView, WorkloadId, WorkloadView};
use crate::error::DrsError;
use anyhow::{bail, Result};
use rusqlite::{params, Connection, Row};
use std::collections::{BTreeSet, HashSet};

const HOST_COLUMNS: &str = "id, name, hypervisor, cpu_total_mhz, cpu_used_mhz, \
     memory_total_bytes, memory_used_bytes, avoid, host_tags, storage_tags";

const WORKLOAD_COLUMNS: &str = "w.id, w.name, w.cpu_mhz, w.memory_bytes, w.host_id, \
     w.requires_storage_motion, w.storage_tag, w.host_tag, w.pinned";

fn join_tags<'a>(tags: impl IntoIterator<Item = &'a String>) -> String {
    let set: BTreeSet<&str> =
        tags.into_iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
    set.into_iter().collect::<Vec<_>>().join(",")
}

fn split_tags(raw: &str) -> BTreeSet<String> {
    raw.split(',').map(str::trim).filter(|t| !t.is_empty()).map(str::to_string).collect()
}

fn map_host_row(row: &Row<'_>) -> rusqlite::Result<HostView> {
    let host_tags: String = row.get(8)?;
    let storage_tags: String = row.get(9)?;
    Ok(HostView {
        id: row.get(0)?,
        name: row.get(1)?,
        hypervisor: row.get(2)?,
        cpu_total_mhz: row.get::<_, i64>(3)? as u64,
        cpu_used_mhz: row.get::<_, i64>(4)? as u64,
        memory_total_bytes: row.get::<_, i64>(5)? as u64,
        memory_used_bytes: row.get::<_, i64>(6)? as u64,
        workloads: BTreeSet::new(),
        avoid: row.get(7)?,
        host_tags: split_tags(&host_tags),
        storage_tags: split_tags(&storage_tags),
    })
}

fn map_workload_row(row: &Row<'_>) -> rusqlite::Result<WorkloadView> {
    Ok(WorkloadView {
        id: row.get(0)?,
        name: row.get(1)?,
        cpu_mhz: row.get::<_, i64>(2)? as u64,
        memory_bytes: row.get::<_, i64>(3)? as u64,
        host_id: row.get(4)?,
        requires_storage_motion: row.get(5)?,
        storage_tag: row.get(6)?,
        host_tag: row.get(7)?,
        pinned: row.get(8)?,
    })
}

fn cluster_exists(conn: &Connection, cluster_id: ClusterId) -> rusqlite::Result<bool> {
    conn.query_row("SELECT COUNT(*) > 0 FROM clusters WHERE id = ?1", params![cluster_id], |row| {
        row.get(0)
    })
}

impl Database {
    /// Replace a cluster's hosts and workloads with `inventory`.
    ///
    /// Creates the cluster if needed. Host and workload ids are global, so an
    /// id that already belongs to another cluster is rejected.
    pub(crate) fn replace_inventory(&self, cluster_id: ClusterId, inventory: &Inventory) -> Result<()> {
        let mut seen_hosts = HashSet::new();
        let mut seen_workloads = HashSet::new();
        for host in &inventory.hosts {
            if !seen_hosts.insert(host.id) {
                bail!("host {} listed more than once", host.id);
            }
            for workload in &host.workloads {
                if !seen_workloads.insert(workload.id) {
                    bail!("workload {} listed on more than one host", workload.id);
                }
            }
        }

        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO clusters (id, name, updated_at) \
             VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ','now')) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, updated_at = excluded.updated_at",
            params![cluster_id, inventory.name],
        )?;

        {
            let mut foreign_host = tx.prepare(
                "SELECT cluster_id FROM hosts WHERE id = ?1 AND cluster_id != ?2",
            )?;
            for host in &inventory.hosts {
                let other: Option<ClusterId> = foreign_host
                    .query_row(params![host.id, cluster_id], |row| row.get(0))
                    .optional()?;
                if let Some(other) = other {
                    bail!("host {} already belongs to cluster {}", host.id, other);
                }
            }

            let mut foreign_workload = tx.prepare(
                "SELECT h.cluster_id FROM workloads w JOIN hosts h ON w.host_id = h.id \
                 WHERE w.id = ?1 AND h.cluster_id != ?2",
            )?;
            for workload in inventory.hosts.iter().flat_map(|h| &h.workloads) {
                let other: Option<ClusterId> = foreign_workload
                    .query_row(params![workload.id, cluster_id], |row| row.get(0))
                    .optional()?;
                if let Some(other) = other {
                    bail!("workload {} already belongs to cluster {}", workload.id, other);
                }
            }
        }

        tx.execute("DELETE FROM hosts WHERE cluster_id = ?1", params![cluster_id])?;

        {
            let mut insert_host = tx.prepare(
                "INSERT INTO hosts (id, cluster_id, name, hypervisor, cpu_total_mhz, cpu_used_mhz, \
                 memory_total_bytes, memory_used_bytes, avoid, host_tags, storage_tags) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            let mut insert_workload = tx.prepare(
                "INSERT INTO workloads (id, host_id, name, cpu_mhz, memory_bytes, \
                 requires_storage_motion, storage_tag, host_tag, pinned) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;

            for host in &inventory.hosts {
                insert_host.execute(params![
                    host.id,
                    cluster_id,
                    host.name,
                    host.hypervisor,
                    host.cpu_total_mhz as i64,
                    host.cpu_used_mhz as i64,
                    host.memory_total_bytes as i64,
                    host.memory_used_bytes as i64,
                    host.avoid,
                    join_tags(&host.host_tags),
                    join_tags(&host.storage_tags),
                ])?;

                for workload in &host.workloads {
                    insert_workload.execute(params![
                        workload.id,
                        host.id,
                        workload.name,
                        workload.cpu_mhz as i64,
                        workload.memory_bytes as i64,
                        workload.requires_storage_motion,
                        workload.storage_tag,
                        workload.host_tag,
                        workload.pinned,
                    ])?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// List all clusters with inventory counts.
    pub(crate) fn list_clusters(&self) -> Result<Vec<Cluster>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.name, \
                    (SELECT COUNT(*) FROM hosts h WHERE h.cluster_id = c.id), \
                    (SELECT COUNT(*) FROM workloads w JOIN hosts h ON w.host_id = h.id \
                     WHERE h.cluster_id = c.id), \
                    EXISTS (SELECT 1 FROM cluster_drs_config d WHERE d.cluster_id = c.id), \
                    c.updated_at \
             FROM clusters c ORDER BY c.id",
        )?;
        let clusters = stmt
            .query_map([], |row| {
                Ok(Cluster {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    host_count: row.get(2)?,
                    workload_count: row.get(3)?,
                    drs_configured: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(clusters)
    }

    pub(crate) fn cluster_exists(&self, cluster_id: ClusterId) -> Result<bool> {
        Ok(cluster_exists(&self.conn(), cluster_id)?)
    }

    /// Build a point-in-time snapshot of one cluster.
    pub(crate) fn load_snapshot(&self, cluster_id: ClusterId) -> Result<ClusterSnapshot, DrsError> {
        let unavailable = |e: rusqlite::Error| DrsError::snapshot_unavailable(cluster_id, e);
        let conn = self.conn();

        if !cluster_exists(&conn, cluster_id).map_err(unavailable)? {
            return Err(DrsError::ClusterNotFound(cluster_id));
        }

        let mut hosts: Vec<HostView> = {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {HOST_COLUMNS} FROM hosts WHERE cluster_id = ?1 ORDER BY id"
                ))
                .map_err(unavailable)?;
            let rows = stmt.query_map(params![cluster_id], map_host_row).map_err(unavailable)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(unavailable)?
        };

        let workloads: Vec<WorkloadView> = {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {WORKLOAD_COLUMNS} FROM workloads w \
                     JOIN hosts h ON w.host_id = h.id \
                     WHERE h.cluster_id = ?1 ORDER BY w.id"
                ))
                .map_err(unavailable)?;
            let rows =
                stmt.query_map(params![cluster_id], map_workload_row).map_err(unavailable)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(unavailable)?
        };

        for workload in &workloads {
            if let Some(host) = hosts.iter_mut().find(|h| h.id == workload.host_id) {
                host.workloads.insert(workload.id);
            }
        }

        ClusterSnapshot::new(cluster_id, hosts, workloads)
    }

    /// Record that a workload now runs on `destination_host_id`, moving its
    /// demand from the old host's used tallies to the new one's.
    pub(crate) fn reassign_workload(
        &self,
        workload_id: WorkloadId,
        destination_host_id: HostId,
    ) -> Result<()> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;

        let current: Option<(HostId, i64, i64)> = tx
            .query_row(
                "SELECT host_id, cpu_mhz, memory_bytes FROM workloads WHERE id = ?1",
                params![workload_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((source_host_id, cpu, memory)) = current else {
            bail!("workload {workload_id} not found");
        };
        if source_host_id == destination_host_id {
            return Ok(());
        }

        tx.execute(
            "UPDATE hosts SET cpu_used_mhz = MAX(cpu_used_mhz - ?1, 0), \
             memory_used_bytes = MAX(memory_used_bytes - ?2, 0) WHERE id = ?3",
            params![cpu, memory, source_host_id],
        )?;
        let updated = tx.execute(
            "UPDATE hosts SET cpu_used_mhz = cpu_used_mhz + ?1, \
             memory_used_bytes = memory_used_bytes + ?2 WHERE id = ?3",
            params![cpu, memory, destination_host_id],
        )?;
        if updated == 0 {
            bail!("destination host {destination_host_id} not found");
        }
        tx.execute(
            "UPDATE workloads SET host_id = ?1 WHERE id = ?2",
            params![destination_host_id, workload_id],
        )?;

        tx.commit()?;
        Ok(())
    }
}
