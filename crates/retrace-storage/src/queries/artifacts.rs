// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Artifact row operations.
//!
//! `endpoint_id` is written once at insert time and never updated: it is
//! the only record of which endpoint holds the blob, and downloads pin to
//! it.

use retrace_core::RetraceError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{Artifact, parse_enum};

fn row_to_artifact(row: &rusqlite::Row<'_>) -> Result<Artifact, rusqlite::Error> {
    Ok(Artifact {
        id: row.get(0)?,
        session_id: row.get(1)?,
        kind: parse_enum(2, row.get(2)?)?,
        object_key: row.get(3)?,
        endpoint_id: row.get(4)?,
        status: parse_enum(5, row.get(5)?)?,
        size_bytes: row.get(6)?,
        created_at: row.get(7)?,
        ready_at: row.get(8)?,
    })
}

const ARTIFACT_COLUMNS: &str =
    "id, session_id, kind, object_key, endpoint_id, status, size_bytes, created_at, ready_at";

/// Insert a new artifact row.
pub async fn insert_artifact(db: &Database, artifact: &Artifact) -> Result<(), RetraceError> {
    let artifact = artifact.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO artifacts (id, session_id, kind, object_key, endpoint_id,
                                        status, size_bytes, created_at, ready_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    artifact.id,
                    artifact.session_id,
                    artifact.kind.to_string(),
                    artifact.object_key,
                    artifact.endpoint_id,
                    artifact.status.to_string(),
                    artifact.size_bytes,
                    artifact.created_at,
                    artifact.ready_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get an artifact by id.
pub async fn get_artifact(db: &Database, id: &str) -> Result<Option<Artifact>, RetraceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_artifact) {
                Ok(artifact) => Ok(Some(artifact)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark an artifact ready (processing finished or payload confirmed empty).
pub async fn mark_ready(db: &Database, id: &str) -> Result<(), RetraceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE artifacts SET status = 'ready',
                 ready_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All artifacts for a session still in `pending` status. Used by the
/// auto-finalizer's orphan recovery.
pub async fn pending_for_session(
    db: &Database,
    session_id: &str,
) -> Result<Vec<Artifact>, RetraceError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ARTIFACT_COLUMNS} FROM artifacts
                 WHERE session_id = ?1 AND status = 'pending'
                 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(params![session_id], row_to_artifact)?;
            let mut artifacts = Vec::new();
            for row in rows {
                artifacts.push(row?);
            }
            Ok(artifacts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Timestamp of the newest artifact for a session, if any.
pub async fn last_artifact_at(
    db: &Database,
    session_id: &str,
) -> Result<Option<String>, RetraceError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            Ok(conn.query_row(
                "SELECT MAX(created_at) FROM artifacts WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use retrace_core::types::ArtifactStatus;

    use super::*;
    use crate::test_support::{make_artifact, setup_db};

    #[tokio::test]
    async fn insert_get_and_mark_ready() {
        let (db, _dir) = setup_db().await;
        let artifact = make_artifact("a1", "s1");
        insert_artifact(&db, &artifact).await.unwrap();

        let stored = get_artifact(&db, "a1").await.unwrap().unwrap();
        assert_eq!(stored.status, ArtifactStatus::Pending);
        assert_eq!(stored.endpoint_id.as_deref(), Some("ep-1"));
        assert!(stored.ready_at.is_none());

        mark_ready(&db, "a1").await.unwrap();
        let stored = get_artifact(&db, "a1").await.unwrap().unwrap();
        assert_eq!(stored.status, ArtifactStatus::Ready);
        assert!(stored.ready_at.is_some());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn pending_listing_excludes_ready_rows() {
        let (db, _dir) = setup_db().await;
        insert_artifact(&db, &make_artifact("a1", "s1")).await.unwrap();
        insert_artifact(&db, &make_artifact("a2", "s1")).await.unwrap();
        mark_ready(&db, "a1").await.unwrap();

        let pending = pending_for_session(&db, "s1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "a2");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn last_artifact_at_tracks_newest() {
        let (db, _dir) = setup_db().await;
        assert!(last_artifact_at(&db, "s1").await.unwrap().is_none());

        let mut a1 = make_artifact("a1", "s1");
        a1.created_at = "2026-01-01T00:00:00.000Z".to_string();
        let mut a2 = make_artifact("a2", "s1");
        a2.created_at = "2026-01-01T00:05:00.000Z".to_string();
        insert_artifact(&db, &a1).await.unwrap();
        insert_artifact(&db, &a2).await.unwrap();

        assert_eq!(
            last_artifact_at(&db, "s1").await.unwrap().as_deref(),
            Some("2026-01-01T00:05:00.000Z")
        );

        db.close().await.unwrap();
    }
}
