// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job ledger operations: the durable work-item queue driving ingest.
//!
//! State machine per job: `pending -> processing -> {done | pending(retry) | dlq}`.
//! `attempts` strictly increases per claim; `done` and `dlq` are terminal.

use chrono::Duration;
use retrace_core::time::{fmt_ts, parse_ts};
use retrace_core::types::JobStatus;
use rusqlite::params;

use crate::database::Database;
use crate::models::{Job, parse_enum};

fn row_to_job(row: &rusqlite::Row<'_>) -> Result<Job, rusqlite::Error> {
    Ok(Job {
        id: row.get(0)?,
        project_id: row.get(1)?,
        session_id: row.get(2)?,
        artifact_id: row.get(3)?,
        kind: parse_enum(4, row.get(4)?)?,
        payload_ref: row.get(5)?,
        status: parse_enum(6, row.get(6)?)?,
        attempts: row.get(7)?,
        next_run_at: row.get(8)?,
        error_msg: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

const JOB_COLUMNS: &str = "id, project_id, session_id, artifact_id, kind, payload_ref,
     status, attempts, next_run_at, error_msg, created_at, updated_at";

/// Insert a new pending job.
pub async fn insert_job(db: &Database, job: &Job) -> Result<(), retrace_core::RetraceError> {
    let job = job.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO jobs (id, project_id, session_id, artifact_id, kind,
                                   payload_ref, status, attempts, next_run_at, error_msg)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    job.id,
                    job.project_id,
                    job.session_id,
                    job.artifact_id,
                    job.kind.to_string(),
                    job.payload_ref,
                    job.status.to_string(),
                    job.attempts,
                    job.next_run_at,
                    job.error_msg,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a job by id.
pub async fn get_job(db: &Database, id: &str) -> Result<Option<Job>, retrace_core::RetraceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"))?;
            let result = stmt.query_row(params![id], row_to_job);
            match result {
                Ok(job) => Ok(Some(job)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Select the next batch of due pending jobs, oldest first.
///
/// A job is due when `next_run_at` is null or `<= now`. The caller
/// deduplicates the batch by session before fanning out.
pub async fn due_batch(
    db: &Database,
    now: &str,
    limit: u32,
) -> Result<Vec<Job>, retrace_core::RetraceError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs
                 WHERE status = 'pending'
                   AND (next_run_at IS NULL OR next_run_at <= ?1)
                 ORDER BY created_at ASC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![now, limit], row_to_job)?;
            let mut jobs = Vec::new();
            for row in rows {
                jobs.push(row?);
            }
            Ok(jobs)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Claim a pending job for processing: sets `processing` and increments
/// `attempts` atomically. Returns the new attempt count, or `None` if the
/// job was no longer pending (claimed elsewhere or already terminal).
pub async fn claim(db: &Database, id: &str) -> Result<Option<i64>, retrace_core::RetraceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE jobs SET status = 'processing', attempts = attempts + 1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 WHERE id = ?1 AND status = 'pending'",
                params![id],
            )?;
            let attempts = if changed == 1 {
                Some(tx.query_row(
                    "SELECT attempts FROM jobs WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )?)
            } else {
                None
            };
            tx.commit()?;
            Ok(attempts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a job done (terminal).
pub async fn complete(db: &Database, id: &str) -> Result<(), retrace_core::RetraceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE jobs SET status = 'done', error_msg = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a processing failure.
///
/// If the job's attempts have reached `max_attempts` the job moves to the
/// dead-letter state; otherwise it goes back to `pending` with
/// `next_run_at = now + 2^attempts` seconds (exponential backoff). The
/// error message is sanitized (NUL bytes stripped) before persisting.
/// Returns the resulting status.
pub async fn fail(
    db: &Database,
    id: &str,
    error_msg: &str,
    max_attempts: i64,
    now: &str,
) -> Result<JobStatus, retrace_core::RetraceError> {
    let id = id.to_string();
    let error_msg = sanitize_error(error_msg);
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let attempts: i64 = conn.query_row(
                "SELECT attempts FROM jobs WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;

            if attempts >= max_attempts {
                conn.execute(
                    "UPDATE jobs SET status = 'dlq', error_msg = ?1, next_run_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                     WHERE id = ?2",
                    params![error_msg, id],
                )?;
                Ok(JobStatus::Dlq)
            } else {
                let next_run_at = parse_ts(&now)
                    .map(|t| fmt_ts(t + Duration::seconds(1 << attempts.clamp(0, 30))));
                conn.execute(
                    "UPDATE jobs SET status = 'pending', error_msg = ?1, next_run_at = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                     WHERE id = ?3",
                    params![error_msg, next_run_at, id],
                )?;
                Ok(JobStatus::Pending)
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Count a session's outstanding (pending or processing) jobs.
pub async fn outstanding_for_session(
    db: &Database,
    session_id: &str,
) -> Result<i64, retrace_core::RetraceError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM jobs
                 WHERE session_id = ?1 AND status IN ('pending','processing')",
                params![session_id],
                |row| row.get(0),
            )?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Whether any job already references the given artifact. Used by the
/// auto-finalizer to keep artifact recovery idempotent.
pub async fn exists_for_artifact(
    db: &Database,
    artifact_id: &str,
) -> Result<bool, retrace_core::RetraceError> {
    let artifact_id = artifact_id.to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE artifact_id = ?1",
                params![artifact_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Strip characters the persistence layer rejects (NUL bytes) from an
/// error message before it is stored for diagnostics.
pub fn sanitize_error(msg: &str) -> String {
    msg.replace('\0', "")
}
