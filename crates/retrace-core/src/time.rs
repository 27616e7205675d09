// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timestamp formatting helpers.
//!
//! All persisted timestamps are RFC3339 UTC with millisecond precision
//! (`2026-01-01T00:00:00.000Z`), matching SQLite's
//! `strftime('%Y-%m-%dT%H:%M:%fZ','now')`. The format orders
//! lexicographically, so string comparison in SQL is chronological.

use chrono::{DateTime, Utc};

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format a timestamp in the canonical persisted representation.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.format(FORMAT).to_string()
}

/// Parse a timestamp in the canonical persisted representation.
///
/// Accepts any RFC3339 offset for robustness against legacy rows.
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
