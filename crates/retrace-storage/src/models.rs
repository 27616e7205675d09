// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for storage entities.
//!
//! Status and kind columns are persisted as their snake_case string forms
//! and parsed back into the closed enums from `retrace-core`; a row with an
//! unrecognized value fails the query rather than leaking a raw string.

use std::str::FromStr;

use retrace_core::types::{ArtifactKind, ArtifactStatus, JobStatus, SessionStatus};

/// One queued unit of work to process one artifact.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub project_id: String,
    pub session_id: String,
    pub artifact_id: String,
    pub kind: ArtifactKind,
    pub payload_ref: String,
    pub status: JobStatus,
    pub attempts: i64,
    pub next_run_at: Option<String>,
    pub error_msg: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One uploaded binary blob belonging to a session.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: String,
    pub session_id: String,
    pub kind: ArtifactKind,
    pub object_key: String,
    /// Endpoint the blob was written to. Set at upload time and never
    /// changed; `None` only on legacy rows.
    pub endpoint_id: Option<String>,
    pub status: ArtifactStatus,
    pub size_bytes: i64,
    pub created_at: String,
    pub ready_at: Option<String>,
}

/// A recorded mobile session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub project_id: String,
    pub team_id: String,
    pub status: SessionStatus,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub duration_seconds: Option<i64>,
    pub device_id: Option<String>,
    pub retention_tier: String,
    pub screenshot_segments: i64,
    pub screenshot_bytes: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Running aggregates keyed 1:1 with a session.
#[derive(Debug, Clone)]
pub struct SessionMetrics {
    pub session_id: String,
    pub touch_count: i64,
    pub scroll_count: i64,
    pub gesture_count: i64,
    pub input_count: i64,
    pub rage_tap_count: i64,
    pub dead_tap_count: i64,
    pub error_count: i64,
    pub api_call_count: i64,
    pub api_error_count: i64,
    pub api_avg_latency_ms: f64,
    pub ux_score: i64,
    pub interaction_score: i64,
    pub exploration_score: i64,
    /// JSON array of screen names, consecutive repeats collapsed, capped.
    pub visited_screens: String,
    pub unique_screen_count: i64,
    pub updated_at: String,
}

/// A configured object-storage endpoint.
#[derive(Debug, Clone)]
pub struct StorageEndpoint {
    pub id: String,
    /// `None` marks a global/default endpoint.
    pub project_id: Option<String>,
    pub endpoint_url: String,
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_ref: String,
    /// Externally reachable URL used only for presigned links.
    pub public_url: Option<String>,
    pub priority: i64,
    pub active: bool,
    /// Best-effort replication target, never a read source.
    pub shadow: bool,
}

/// A stored crash or ANR record.
#[derive(Debug, Clone)]
pub struct CrashReport {
    pub id: String,
    pub project_id: String,
    pub session_id: String,
    /// "crash" or "anr".
    pub kind: String,
    pub fingerprint: String,
    pub exception_name: String,
    pub message: String,
    pub stack_trace: Option<String>,
    pub occurred_at: String,
}

/// Parse a persisted enum column, mapping failures to a rusqlite
/// conversion error at the given column index.
pub(crate) fn parse_enum<T>(idx: usize, raw: String) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
