// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared fixtures for storage tests.

use retrace_core::types::{ArtifactKind, ArtifactStatus, JobStatus, SessionStatus};
use tempfile::TempDir;

use crate::database::Database;
use crate::models::{Artifact, Job, Session, StorageEndpoint};

/// Open a migrated database in a fresh temp directory. The directory must
/// stay alive for the test's duration.
pub(crate) async fn setup_db() -> (Database, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::open(dir.path().join("retrace.db"))
        .await
        .expect("open database");
    (db, dir)
}

pub(crate) fn make_job(id: &str, session_id: &str, artifact_id: &str) -> Job {
    Job {
        id: id.to_string(),
        project_id: "p1".to_string(),
        session_id: session_id.to_string(),
        artifact_id: artifact_id.to_string(),
        kind: ArtifactKind::Events,
        payload_ref: format!("p1/sessions/{session_id}/events/{artifact_id}.json"),
        status: JobStatus::Pending,
        attempts: 0,
        next_run_at: None,
        error_msg: None,
        created_at: "2026-01-01T00:00:00.000Z".to_string(),
        updated_at: "2026-01-01T00:00:00.000Z".to_string(),
    }
}

pub(crate) fn make_artifact(id: &str, session_id: &str) -> Artifact {
    Artifact {
        id: id.to_string(),
        session_id: session_id.to_string(),
        kind: ArtifactKind::Events,
        object_key: format!("p1/sessions/{session_id}/events/{id}.json"),
        endpoint_id: Some("ep-1".to_string()),
        status: ArtifactStatus::Pending,
        size_bytes: 1024,
        created_at: "2026-01-01T00:00:00.000Z".to_string(),
        ready_at: None,
    }
}

pub(crate) fn make_session(id: &str) -> Session {
    Session {
        id: id.to_string(),
        project_id: "p1".to_string(),
        team_id: "t1".to_string(),
        status: SessionStatus::Processing,
        started_at: "2026-01-01T00:00:00.000Z".to_string(),
        ended_at: None,
        duration_seconds: None,
        device_id: Some("device-1".to_string()),
        retention_tier: "standard".to_string(),
        screenshot_segments: 0,
        screenshot_bytes: 0,
        created_at: "2026-01-01T00:00:00.000Z".to_string(),
        updated_at: "2026-01-01T00:00:00.000Z".to_string(),
    }
}

pub(crate) fn make_endpoint(id: &str, project_id: Option<&str>, priority: i64) -> StorageEndpoint {
    StorageEndpoint {
        id: id.to_string(),
        project_id: project_id.map(str::to_string),
        endpoint_url: format!("https://{id}.storage.example.com"),
        bucket: "retrace".to_string(),
        region: "us-east-1".to_string(),
        access_key_id: "AKIATEST".to_string(),
        secret_ref: format!("RETRACE_SECRET_{}", id.to_uppercase().replace('-', "_")),
        public_url: None,
        priority,
        active: true,
        shadow: false,
    }
}
