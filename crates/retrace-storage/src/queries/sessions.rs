// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session row operations, including the auto-finalizer candidate sweep.
//!
//! Once `ended_at` is set a session is logically closed; later artifact
//! processing may still append metrics but the end time only ever moves
//! forward.

use retrace_core::RetraceError;
use retrace_core::types::SessionStatus;
use rusqlite::params;

use crate::database::Database;
use crate::models::{Session, parse_enum};

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<Session, rusqlite::Error> {
    Ok(Session {
        id: row.get(0)?,
        project_id: row.get(1)?,
        team_id: row.get(2)?,
        status: parse_enum(3, row.get(3)?)?,
        started_at: row.get(4)?,
        ended_at: row.get(5)?,
        duration_seconds: row.get(6)?,
        device_id: row.get(7)?,
        retention_tier: row.get(8)?,
        screenshot_segments: row.get(9)?,
        screenshot_bytes: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

const SESSION_COLUMNS: &str = "id, project_id, team_id, status, started_at, ended_at,
     duration_seconds, device_id, retention_tier, screenshot_segments, screenshot_bytes,
     created_at, updated_at";

/// Create a new session row (and nothing else -- metrics rows are created
/// separately so placeholder creation can be a single transaction).
pub async fn create_session(db: &Database, session: &Session) -> Result<(), RetraceError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, project_id, team_id, status, started_at, ended_at,
                                       duration_seconds, device_id, retention_tier,
                                       screenshot_segments, screenshot_bytes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    session.id,
                    session.project_id,
                    session.team_id,
                    session.status.to_string(),
                    session.started_at,
                    session.ended_at,
                    session.duration_seconds,
                    session.device_id,
                    session.retention_tier,
                    session.screenshot_segments,
                    session.screenshot_bytes,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Create a placeholder session and metrics row if the session is unknown.
///
/// Crash/ANR artifacts can arrive before the session record exists; the
/// insert is `OR IGNORE` on both rows so concurrent creators are safe.
pub async fn create_placeholder(
    db: &Database,
    session_id: &str,
    project_id: &str,
    team_id: &str,
    started_at: &str,
) -> Result<(), RetraceError> {
    let session_id = session_id.to_string();
    let project_id = project_id.to_string();
    let team_id = team_id.to_string();
    let started_at = started_at.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO sessions (id, project_id, team_id, status, started_at)
                 VALUES (?1, ?2, ?3, 'processing', ?4)",
                params![session_id, project_id, team_id, started_at],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO session_metrics (session_id) VALUES (?1)",
                params![session_id],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a session by id.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<Session>, RetraceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_session) {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Update a session's status.
pub async fn set_status(
    db: &Database,
    id: &str,
    status: SessionStatus,
) -> Result<(), RetraceError> {
    let id = id.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET status = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 WHERE id = ?2",
                params![status, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Close a session that has no end time yet.
///
/// Returns `true` if this call closed the session, `false` if `ended_at`
/// was already set (finalization is idempotent).
pub async fn finalize(
    db: &Database,
    id: &str,
    ended_at: &str,
    duration_seconds: i64,
) -> Result<bool, RetraceError> {
    let id = id.to_string();
    let ended_at = ended_at.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions SET ended_at = ?1, duration_seconds = ?2, status = 'ready',
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 WHERE id = ?3 AND ended_at IS NULL",
                params![ended_at, duration_seconds, id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Extend a closed session's end time forward (never backward) and bump
/// its duration to match. Used when late screenshot artifacts carry frames
/// recorded after the session was closed.
pub async fn extend_end(
    db: &Database,
    id: &str,
    candidate_end: &str,
    duration_seconds: i64,
) -> Result<bool, RetraceError> {
    let id = id.to_string();
    let candidate_end = candidate_end.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions SET ended_at = ?1, duration_seconds = ?2,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 WHERE id = ?3 AND (ended_at IS NULL OR ended_at < ?1)",
                params![candidate_end, duration_seconds, id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Add screenshot segment/byte counters (atomic arithmetic, no read-back).
pub async fn add_screenshot_counters(
    db: &Database,
    id: &str,
    segments: i64,
    bytes: i64,
) -> Result<(), RetraceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET
                 screenshot_segments = screenshot_segments + ?1,
                 screenshot_bytes = screenshot_bytes + ?2,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 WHERE id = ?3",
                params![segments, bytes, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Sessions eligible for auto-finalization.
///
/// A candidate is still `processing` with no end time, started before
/// `guard_cutoff`, has at least one artifact, its newest artifact is older
/// than `staleness_cutoff`, and has zero outstanding jobs.
pub async fn finalizer_candidates(
    db: &Database,
    guard_cutoff: &str,
    staleness_cutoff: &str,
    limit: u32,
) -> Result<Vec<Session>, RetraceError> {
    let guard_cutoff = guard_cutoff.to_string();
    let staleness_cutoff = staleness_cutoff.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions s
                 WHERE s.status = 'processing'
                   AND s.ended_at IS NULL
                   AND s.started_at <= ?1
                   AND EXISTS (SELECT 1 FROM artifacts a WHERE a.session_id = s.id)
                   AND (SELECT MAX(a.created_at) FROM artifacts a
                        WHERE a.session_id = s.id) <= ?2
                   AND NOT EXISTS (SELECT 1 FROM jobs j
                                   WHERE j.session_id = s.id
                                     AND j.status IN ('pending','processing'))
                 ORDER BY s.started_at ASC
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![guard_cutoff, staleness_cutoff, limit], row_to_session)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
