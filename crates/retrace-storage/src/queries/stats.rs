// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily project-level rollups.
//!
//! Both tables use `ON CONFLICT ... DO UPDATE` with arithmetic against
//! `excluded`, so concurrent batches add up instead of overwriting.

use retrace_core::RetraceError;
use rusqlite::params;

use crate::database::Database;

/// Bump a project's crash/ANR counters for a date.
pub async fn bump_daily_stats(
    db: &Database,
    project_id: &str,
    date: &str,
    crashes: i64,
    anrs: i64,
) -> Result<(), RetraceError> {
    let project_id = project_id.to_string();
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO daily_stats (project_id, date, crash_count, anr_count)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (project_id, date) DO UPDATE SET
                 crash_count = crash_count + excluded.crash_count,
                 anr_count = anr_count + excluded.anr_count",
                params![project_id, date, crashes, anrs],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Accumulate per-endpoint API call stats for a date.
pub async fn bump_api_endpoint_stats(
    db: &Database,
    project_id: &str,
    endpoint: &str,
    date: &str,
    calls: i64,
    errors: i64,
    latency_sum_ms: f64,
) -> Result<(), RetraceError> {
    let project_id = project_id.to_string();
    let endpoint = endpoint.to_string();
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO api_endpoint_stats
                 (project_id, endpoint, date, call_count, error_count, latency_sum_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (project_id, endpoint, date) DO UPDATE SET
                 call_count = call_count + excluded.call_count,
                 error_count = error_count + excluded.error_count,
                 latency_sum_ms = latency_sum_ms + excluded.latency_sum_ms",
                params![project_id, endpoint, date, calls, errors, latency_sum_ms],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Read back one daily_stats row: `(crash_count, anr_count)`.
pub async fn get_daily_stats(
    db: &Database,
    project_id: &str,
    date: &str,
) -> Result<Option<(i64, i64)>, RetraceError> {
    let project_id = project_id.to_string();
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT crash_count, anr_count FROM daily_stats
                 WHERE project_id = ?1 AND date = ?2",
                params![project_id, date],
                |row| Ok((row.get(0)?, row.get(1)?)),
            );
            match result {
                Ok(stats) => Ok(Some(stats)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Read back one api_endpoint_stats row: `(call_count, error_count, latency_sum_ms)`.
pub async fn get_api_endpoint_stats(
    db: &Database,
    project_id: &str,
    endpoint: &str,
    date: &str,
) -> Result<Option<(i64, i64, f64)>, RetraceError> {
    let project_id = project_id.to_string();
    let endpoint = endpoint.to_string();
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT call_count, error_count, latency_sum_ms FROM api_endpoint_stats
                 WHERE project_id = ?1 AND endpoint = ?2 AND date = ?3",
                params![project_id, endpoint, date],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            );
            match result {
                Ok(stats) => Ok(Some(stats)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_db;

    #[tokio::test]
    async fn daily_stats_accumulate() {
        let (db, _dir) = setup_db().await;
        bump_daily_stats(&db, "p1", "2026-01-01", 1, 0).await.unwrap();
        bump_daily_stats(&db, "p1", "2026-01-01", 2, 1).await.unwrap();
        bump_daily_stats(&db, "p1", "2026-01-02", 1, 0).await.unwrap();

        assert_eq!(
            get_daily_stats(&db, "p1", "2026-01-01").await.unwrap(),
            Some((3, 1))
        );
        assert_eq!(
            get_daily_stats(&db, "p1", "2026-01-02").await.unwrap(),
            Some((1, 0))
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn api_endpoint_stats_accumulate() {
        let (db, _dir) = setup_db().await;
        bump_api_endpoint_stats(&db, "p1", "GET /api/items", "2026-01-01", 2, 0, 120.0)
            .await
            .unwrap();
        bump_api_endpoint_stats(&db, "p1", "GET /api/items", "2026-01-01", 3, 1, 330.0)
            .await
            .unwrap();

        let (calls, errors, latency) = get_api_endpoint_stats(&db, "p1", "GET /api/items", "2026-01-01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(calls, 5);
        assert_eq!(errors, 1);
        assert!((latency - 450.0).abs() < 1e-9);

        db.close().await.unwrap();
    }
}
