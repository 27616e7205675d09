// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session metric aggregates.
//!
//! All counter updates are SQL arithmetic against the stored row inside a
//! single transaction, never read-modify-write from the caller's copy, so
//! concurrent artifact batches for one session cannot lose increments.
//! In SQLite every right-hand expression of an UPDATE sees the pre-update
//! row, which lets the latency average fold against the old call count in
//! the same statement that bumps it.

use retrace_core::RetraceError;
use rusqlite::params;

use crate::database::Database;
use crate::models::SessionMetrics;

/// Hard cap on the stored screen path length.
pub const SCREEN_PATH_CAP: usize = 50;

/// Additive changes extracted from one artifact batch.
#[derive(Debug, Clone, Default)]
pub struct MetricsDelta {
    pub touch_count: i64,
    pub scroll_count: i64,
    pub gesture_count: i64,
    pub input_count: i64,
    pub rage_tap_count: i64,
    pub dead_tap_count: i64,
    pub error_count: i64,
    pub api_call_count: i64,
    pub api_error_count: i64,
    /// Sum of latencies for this batch's API calls, in milliseconds.
    pub api_latency_sum_ms: f64,
    /// Screen names visited in this batch, in order.
    pub screens: Vec<String>,
}

impl MetricsDelta {
    pub fn is_empty(&self) -> bool {
        self.touch_count == 0
            && self.scroll_count == 0
            && self.gesture_count == 0
            && self.input_count == 0
            && self.rage_tap_count == 0
            && self.dead_tap_count == 0
            && self.error_count == 0
            && self.api_call_count == 0
            && self.api_error_count == 0
            && self.screens.is_empty()
    }
}

fn row_to_metrics(row: &rusqlite::Row<'_>) -> Result<SessionMetrics, rusqlite::Error> {
    Ok(SessionMetrics {
        session_id: row.get(0)?,
        touch_count: row.get(1)?,
        scroll_count: row.get(2)?,
        gesture_count: row.get(3)?,
        input_count: row.get(4)?,
        rage_tap_count: row.get(5)?,
        dead_tap_count: row.get(6)?,
        error_count: row.get(7)?,
        api_call_count: row.get(8)?,
        api_error_count: row.get(9)?,
        api_avg_latency_ms: row.get(10)?,
        ux_score: row.get(11)?,
        interaction_score: row.get(12)?,
        exploration_score: row.get(13)?,
        visited_screens: row.get(14)?,
        unique_screen_count: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

const METRIC_COLUMNS: &str = "session_id, touch_count, scroll_count, gesture_count, input_count,
     rage_tap_count, dead_tap_count, error_count, api_call_count, api_error_count,
     api_avg_latency_ms, ux_score, interaction_score, exploration_score,
     visited_screens, unique_screen_count, updated_at";

/// Create the metrics row for a session if it does not exist yet.
pub async fn ensure_metrics(db: &Database, session_id: &str) -> Result<(), RetraceError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO session_metrics (session_id) VALUES (?1)",
                params![session_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a session's metrics row.
pub async fn get_metrics(
    db: &Database,
    session_id: &str,
) -> Result<Option<SessionMetrics>, RetraceError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {METRIC_COLUMNS} FROM session_metrics WHERE session_id = ?1"
            ))?;
            match stmt.query_row(params![session_id], row_to_metrics) {
                Ok(metrics) => Ok(Some(metrics)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Apply one batch's delta to a session's aggregates.
///
/// Counters are incremented in place; the API latency average is folded as
/// a weighted mean of the stored average and this batch's sum; the visited
/// screen path is merged and capped; derived scores are recomputed from
/// the post-update counters. All of it commits in one transaction.
pub async fn apply_delta(
    db: &Database,
    session_id: &str,
    delta: &MetricsDelta,
) -> Result<SessionMetrics, RetraceError> {
    let session_id = session_id.to_string();
    let delta = delta.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "UPDATE session_metrics SET
                 touch_count = touch_count + ?1,
                 scroll_count = scroll_count + ?2,
                 gesture_count = gesture_count + ?3,
                 input_count = input_count + ?4,
                 rage_tap_count = rage_tap_count + ?5,
                 dead_tap_count = dead_tap_count + ?6,
                 error_count = error_count + ?7,
                 api_error_count = api_error_count + ?8,
                 api_avg_latency_ms = CASE WHEN api_call_count + ?9 > 0
                     THEN (api_avg_latency_ms * api_call_count + ?10)
                          / (api_call_count + ?9)
                     ELSE 0 END,
                 api_call_count = api_call_count + ?9,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 WHERE session_id = ?11",
                params![
                    delta.touch_count,
                    delta.scroll_count,
                    delta.gesture_count,
                    delta.input_count,
                    delta.rage_tap_count,
                    delta.dead_tap_count,
                    delta.error_count,
                    delta.api_error_count,
                    delta.api_call_count,
                    delta.api_latency_sum_ms,
                    session_id,
                ],
            )?;

            let mut stmt = tx.prepare(&format!(
                "SELECT {METRIC_COLUMNS} FROM session_metrics WHERE session_id = ?1"
            ))?;
            let mut metrics = stmt.query_row(params![session_id], row_to_metrics)?;
            drop(stmt);

            let mut path: Vec<String> =
                serde_json::from_str(&metrics.visited_screens).unwrap_or_default();
            for screen in &delta.screens {
                if path.last().map(String::as_str) == Some(screen.as_str()) {
                    continue;
                }
                if path.len() >= SCREEN_PATH_CAP {
                    break;
                }
                path.push(screen.clone());
            }
            let unique: std::collections::HashSet<&str> =
                path.iter().map(String::as_str).collect();

            metrics.visited_screens = serde_json::to_string(&path)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            metrics.unique_screen_count = unique.len() as i64;
            metrics.ux_score = ux_score(&metrics);
            metrics.interaction_score = interaction_score(&metrics);
            metrics.exploration_score = exploration_score(&metrics);

            tx.execute(
                "UPDATE session_metrics SET
                 visited_screens = ?1, unique_screen_count = ?2,
                 ux_score = ?3, interaction_score = ?4, exploration_score = ?5
                 WHERE session_id = ?6",
                params![
                    metrics.visited_screens,
                    metrics.unique_screen_count,
                    metrics.ux_score,
                    metrics.interaction_score,
                    metrics.exploration_score,
                    session_id,
                ],
            )?;
            tx.commit()?;
            Ok(metrics)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Frustration-weighted experience score, 0..=100.
///
/// Each frustration signal subtracts a capped penalty; a small engagement
/// bonus rewards sessions with real interaction.
fn ux_score(m: &SessionMetrics) -> i64 {
    let penalty = (m.rage_tap_count * 15).min(45)
        + (m.dead_tap_count * 8).min(24)
        + (m.error_count * 10).min(30)
        + (m.api_error_count * 5).min(20);
    let bonus = (m.touch_count + m.scroll_count).min(10);
    (100 - penalty + bonus).clamp(0, 100)
}

fn interaction_score(m: &SessionMetrics) -> i64 {
    (m.touch_count * 2 + m.scroll_count * 2 + m.gesture_count * 3).min(100)
}

fn exploration_score(m: &SessionMetrics) -> i64 {
    (m.unique_screen_count * 20).min(100)
}
