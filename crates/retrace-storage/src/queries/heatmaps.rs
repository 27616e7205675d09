// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-screen daily touch heatmaps.
//!
//! Buckets are stored as a JSON object of `"x,y" -> count` in normalized
//! grid coordinates. Merges are additive and run inside one transaction:
//! the stored object is read, counts are summed, and the merged object is
//! written back, so concurrent sessions on the same screen never clobber
//! each other through the single-writer connection.

use std::collections::BTreeMap;

use retrace_core::RetraceError;
use rusqlite::params;

use crate::database::Database;

/// One batch of heatmap increments for a (project, screen, date) cell.
#[derive(Debug, Clone, Default)]
pub struct HeatmapDelta {
    pub touch_buckets: BTreeMap<String, i64>,
    pub rage_tap_buckets: BTreeMap<String, i64>,
}

impl HeatmapDelta {
    pub fn is_empty(&self) -> bool {
        self.touch_buckets.is_empty() && self.rage_tap_buckets.is_empty()
    }
}

/// A stored heatmap cell.
#[derive(Debug, Clone)]
pub struct HeatmapCell {
    pub project_id: String,
    pub screen_name: String,
    pub date: String,
    pub touch_buckets: BTreeMap<String, i64>,
    pub rage_tap_buckets: BTreeMap<String, i64>,
    pub touch_total: i64,
    pub rage_tap_total: i64,
}

fn merge(into: &mut BTreeMap<String, i64>, from: &BTreeMap<String, i64>) {
    for (bucket, count) in from {
        *into.entry(bucket.clone()).or_insert(0) += count;
    }
}

fn parse_buckets(raw: &str) -> BTreeMap<String, i64> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Merge a batch's buckets into the (project, screen, date) cell,
/// creating the row if needed.
pub async fn merge_heatmap(
    db: &Database,
    project_id: &str,
    screen_name: &str,
    date: &str,
    delta: &HeatmapDelta,
) -> Result<(), RetraceError> {
    let project_id = project_id.to_string();
    let screen_name = screen_name.to_string();
    let date = date.to_string();
    let delta = delta.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO screen_heatmaps (project_id, screen_name, date)
                 VALUES (?1, ?2, ?3)",
                params![project_id, screen_name, date],
            )?;

            let (raw_touch, raw_rage): (String, String) = tx.query_row(
                "SELECT touch_buckets, rage_tap_buckets FROM screen_heatmaps
                 WHERE project_id = ?1 AND screen_name = ?2 AND date = ?3",
                params![project_id, screen_name, date],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let mut touch = parse_buckets(&raw_touch);
            let mut rage = parse_buckets(&raw_rage);
            merge(&mut touch, &delta.touch_buckets);
            merge(&mut rage, &delta.rage_tap_buckets);

            let touch_add: i64 = delta.touch_buckets.values().sum();
            let rage_add: i64 = delta.rage_tap_buckets.values().sum();
            let touch_json = serde_json::to_string(&touch)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            let rage_json = serde_json::to_string(&rage)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;

            tx.execute(
                "UPDATE screen_heatmaps SET
                 touch_buckets = ?1, rage_tap_buckets = ?2,
                 touch_total = touch_total + ?3, rage_tap_total = rage_tap_total + ?4
                 WHERE project_id = ?5 AND screen_name = ?6 AND date = ?7",
                params![touch_json, rage_json, touch_add, rage_add, project_id, screen_name, date],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch one heatmap cell.
pub async fn get_heatmap(
    db: &Database,
    project_id: &str,
    screen_name: &str,
    date: &str,
) -> Result<Option<HeatmapCell>, RetraceError> {
    let project_id = project_id.to_string();
    let screen_name = screen_name.to_string();
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT project_id, screen_name, date, touch_buckets, rage_tap_buckets,
                        touch_total, rage_tap_total
                 FROM screen_heatmaps
                 WHERE project_id = ?1 AND screen_name = ?2 AND date = ?3",
                params![project_id, screen_name, date],
                |row| {
                    let raw_touch: String = row.get(3)?;
                    let raw_rage: String = row.get(4)?;
                    Ok(HeatmapCell {
                        project_id: row.get(0)?,
                        screen_name: row.get(1)?,
                        date: row.get(2)?,
                        touch_buckets: parse_buckets(&raw_touch),
                        rage_tap_buckets: parse_buckets(&raw_rage),
                        touch_total: row.get(5)?,
                        rage_tap_total: row.get(6)?,
                    })
                },
            );
            match result {
                Ok(cell) => Ok(Some(cell)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}
