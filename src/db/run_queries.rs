use super::models::RunSummary;
use super::optional_ext::OptionalExt;
use super::Database;
use crate::balancer::{ClusterId, ScoreTriple, StopReason};
use crate::error::MigrationErrorKind;
use crate::executor::{DrsRunReport, MoveRecord, MoveStatus, RunOutcome};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const RUN_COLUMNS: &str = "id, cluster_id, started_at, finished_at, outcome, imbalance_detected, \
     algorithm, initial_imbalance, projected_imbalance, stop_reason, detail";

const MOVE_COLUMNS: &str = "exec_order, workload_id, source_host_id, destination_host_id, \
     requires_storage_motion, benefit, cost, net, status, error_kind, detail";

fn conversion_error(
    idx: usize,
    e: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn map_run_row(row: &Row<'_>) -> rusqlite::Result<DrsRunReport> {
    let id: String = row.get(0)?;
    let started_at: String = row.get(2)?;
    let finished_at: Option<String> = row.get(3)?;
    let outcome: String = row.get(4)?;
    let stop_reason: Option<String> = row.get(9)?;

    Ok(DrsRunReport {
        run_id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        cluster_id: row.get(1)?,
        started_at: parse_timestamp(2, &started_at)?,
        finished_at: finished_at.as_deref().map(|t| parse_timestamp(3, t)).transpose()?,
        outcome: RunOutcome::try_from(outcome.as_str()).map_err(|e| conversion_error(4, e))?,
        imbalance_detected: row.get(5)?,
        algorithm: row.get(6)?,
        initial_imbalance: row.get(7)?,
        projected_imbalance: row.get(8)?,
        stop_reason: stop_reason
            .as_deref()
            .map(StopReason::try_from)
            .transpose()
            .map_err(|e| conversion_error(9, e))?,
        moves: Vec::new(),
        detail: row.get(10)?,
    })
}

fn map_move_row(row: &Row<'_>) -> rusqlite::Result<MoveRecord> {
    let status: String = row.get(8)?;
    let error_kind: Option<String> = row.get(9)?;
    Ok(MoveRecord {
        order: row.get(0)?,
        workload_id: row.get(1)?,
        source_host_id: row.get(2)?,
        destination_host_id: row.get(3)?,
        requires_storage_motion: row.get(4)?,
        score: ScoreTriple { benefit: row.get(5)?, cost: row.get(6)?, net: row.get(7)? },
        status: MoveStatus::try_from(status.as_str()).map_err(|e| conversion_error(8, e))?,
        error_kind: error_kind
            .as_deref()
            .map(MigrationErrorKind::try_from)
            .transpose()
            .map_err(|e| conversion_error(9, e))?,
        detail: row.get(10)?,
    })
}

fn upsert_move(conn: &Connection, run_id: &str, record: &MoveRecord) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO drs_run_moves \
         (run_id, exec_order, workload_id, source_host_id, destination_host_id, \
          requires_storage_motion, benefit, cost, net, status, error_kind, detail) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
         ON CONFLICT(run_id, exec_order) DO UPDATE SET \
           status = excluded.status, \
           error_kind = excluded.error_kind, \
           detail = excluded.detail",
        params![
            run_id,
            record.order,
            record.workload_id,
            record.source_host_id,
            record.destination_host_id,
            record.requires_storage_motion,
            record.score.benefit,
            record.score.cost,
            record.score.net,
            record.status.as_str(),
            record.error_kind.map(MigrationErrorKind::as_str),
            record.detail,
        ],
    )
}

impl Database {
    /// Insert or update a run and every move record it carries.
    pub(crate) fn save_run(&self, report: &DrsRunReport) -> Result<()> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let run_id = report.run_id.to_string();

        tx.execute(
            "INSERT INTO drs_runs \
             (id, cluster_id, started_at, finished_at, outcome, imbalance_detected, algorithm, \
              initial_imbalance, projected_imbalance, stop_reason, detail) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
             ON CONFLICT(id) DO UPDATE SET \
               finished_at = excluded.finished_at, \
               outcome = excluded.outcome, \
               imbalance_detected = excluded.imbalance_detected, \
               algorithm = excluded.algorithm, \
               initial_imbalance = excluded.initial_imbalance, \
               projected_imbalance = excluded.projected_imbalance, \
               stop_reason = excluded.stop_reason, \
               detail = excluded.detail",
            params![
                run_id,
                report.cluster_id,
                report.started_at.to_rfc3339(),
                report.finished_at.map(|t| t.to_rfc3339()),
                report.outcome.as_str(),
                report.imbalance_detected,
                report.algorithm,
                report.initial_imbalance,
                report.projected_imbalance,
                report.stop_reason.map(StopReason::as_str),
                report.detail,
            ],
        )?;

        for record in &report.moves {
            upsert_move(&tx, &run_id, record)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Insert or update one move record of an existing run.
    pub(crate) fn save_move(&self, run_id: Uuid, record: &MoveRecord) -> Result<()> {
        let conn = self.conn();
        upsert_move(&conn, &run_id.to_string(), record)?;
        Ok(())
    }

    /// A run with all of its moves in execution order.
    pub(crate) fn get_run(&self, run_id: Uuid) -> Result<Option<DrsRunReport>> {
        let conn = self.conn();
        let run_id = run_id.to_string();

        let report = conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM drs_runs WHERE id = ?1"),
                params![run_id],
                map_run_row,
            )
            .optional()?;
        let Some(mut report) = report else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(&format!(
            "SELECT {MOVE_COLUMNS} FROM drs_run_moves WHERE run_id = ?1 ORDER BY exec_order"
        ))?;
        report.moves =
            stmt.query_map(params![run_id], map_move_row)?.collect::<Result<Vec<_>, _>>()?;

        Ok(Some(report))
    }

    /// The cluster's newest run still marked `running`, if any.
    pub(crate) fn unfinished_run(&self, cluster_id: ClusterId) -> Result<Option<DrsRunReport>> {
        let run_id: Option<String> = {
            let conn = self.conn();
            conn.query_row(
                "SELECT id FROM drs_runs WHERE cluster_id = ?1 AND outcome = 'running' \
                 ORDER BY started_at DESC LIMIT 1",
                params![cluster_id],
                |row| row.get(0),
            )
            .optional()?
        };
        match run_id {
            Some(id) => self.get_run(Uuid::parse_str(&id)?),
            None => Ok(None),
        }
    }

    /// Most recent runs for a cluster, newest first.
    pub(crate) fn list_runs(&self, cluster_id: ClusterId, limit: u32) -> Result<Vec<RunSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT r.id, r.cluster_id, r.started_at, r.finished_at, r.outcome, \
                    r.imbalance_detected, r.algorithm, r.initial_imbalance, \
                    r.projected_imbalance, \
                    (SELECT COUNT(*) FROM drs_run_moves m WHERE m.run_id = r.id), \
                    r.detail \
             FROM drs_runs r WHERE r.cluster_id = ?1 \
             ORDER BY r.started_at DESC LIMIT ?2",
        )?;
        let runs = stmt
            .query_map(params![cluster_id, limit], |row| {
                Ok(RunSummary {
                    run_id: row.get(0)?,
                    cluster_id: row.get(1)?,
                    started_at: row.get(2)?,
                    finished_at: row.get(3)?,
                    outcome: row.get(4)?,
                    imbalance_detected: row.get(5)?,
                    algorithm: row.get(6)?,
                    initial_imbalance: row.get(7)?,
                    projected_imbalance: row.get(8)?,
                    total_moves: row.get(9)?,
                    detail: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}
