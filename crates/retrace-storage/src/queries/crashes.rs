// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crash and ANR report persistence.

use retrace_core::RetraceError;
use rusqlite::params;

use crate::database::Database;
use crate::models::CrashReport;

fn row_to_report(row: &rusqlite::Row<'_>) -> Result<CrashReport, rusqlite::Error> {
    Ok(CrashReport {
        id: row.get(0)?,
        project_id: row.get(1)?,
        session_id: row.get(2)?,
        kind: row.get(3)?,
        fingerprint: row.get(4)?,
        exception_name: row.get(5)?,
        message: row.get(6)?,
        stack_trace: row.get(7)?,
        occurred_at: row.get(8)?,
    })
}

/// Insert a crash/ANR report. `OR IGNORE` keeps a retried job from
/// duplicating the same report id.
pub async fn insert_report(db: &Database, report: &CrashReport) -> Result<(), RetraceError> {
    let report = report.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO crash_reports
                 (id, project_id, session_id, kind, fingerprint, exception_name,
                  message, stack_trace, occurred_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    report.id,
                    report.project_id,
                    report.session_id,
                    report.kind,
                    report.fingerprint,
                    report.exception_name,
                    report.message,
                    report.stack_trace,
                    report.occurred_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All reports sharing a fingerprint within a project, newest first.
pub async fn reports_by_fingerprint(
    db: &Database,
    project_id: &str,
    fingerprint: &str,
) -> Result<Vec<CrashReport>, RetraceError> {
    let project_id = project_id.to_string();
    let fingerprint = fingerprint.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, project_id, session_id, kind, fingerprint, exception_name,
                        message, stack_trace, occurred_at
                 FROM crash_reports
                 WHERE project_id = ?1 AND fingerprint = ?2
                 ORDER BY occurred_at DESC",
            )?;
            let rows = stmt.query_map(params![project_id, fingerprint], row_to_report)?;
            let mut reports = Vec::new();
            for row in rows {
                reports.push(row?);
            }
            Ok(reports)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
