// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage endpoint catalog.
//!
//! Endpoints with a `project_id` override the global pool (rows with NULL
//! project). Shadow endpoints receive best-effort replicas but are never
//! read from or selected for primary writes.

use retrace_core::RetraceError;
use rusqlite::params;

use crate::database::Database;
use crate::models::StorageEndpoint;

fn row_to_endpoint(row: &rusqlite::Row<'_>) -> Result<StorageEndpoint, rusqlite::Error> {
    Ok(StorageEndpoint {
        id: row.get(0)?,
        project_id: row.get(1)?,
        endpoint_url: row.get(2)?,
        bucket: row.get(3)?,
        region: row.get(4)?,
        access_key_id: row.get(5)?,
        secret_ref: row.get(6)?,
        public_url: row.get(7)?,
        priority: row.get(8)?,
        active: row.get(9)?,
        shadow: row.get(10)?,
    })
}

const ENDPOINT_COLUMNS: &str = "id, project_id, endpoint_url, bucket, region, access_key_id,
     secret_ref, public_url, priority, active, shadow";

/// Insert an endpoint row.
pub async fn insert_endpoint(db: &Database, endpoint: &StorageEndpoint) -> Result<(), RetraceError> {
    let endpoint = endpoint.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO storage_endpoints
                 (id, project_id, endpoint_url, bucket, region, access_key_id,
                  secret_ref, public_url, priority, active, shadow)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    endpoint.id,
                    endpoint.project_id,
                    endpoint.endpoint_url,
                    endpoint.bucket,
                    endpoint.region,
                    endpoint.access_key_id,
                    endpoint.secret_ref,
                    endpoint.public_url,
                    endpoint.priority,
                    endpoint.active,
                    endpoint.shadow,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get an endpoint by id (active or not; downloads pin to stored ids).
pub async fn get_endpoint(
    db: &Database,
    id: &str,
) -> Result<Option<StorageEndpoint>, RetraceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENDPOINT_COLUMNS} FROM storage_endpoints WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_endpoint) {
                Ok(endpoint) => Ok(Some(endpoint)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Active non-shadow endpoints eligible for primary writes in a project.
///
/// Project-scoped endpoints take precedence; the global pool (NULL
/// project) is the fallback when the project has none.
pub async fn primary_candidates(
    db: &Database,
    project_id: &str,
) -> Result<Vec<StorageEndpoint>, RetraceError> {
    let project_id = project_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENDPOINT_COLUMNS} FROM storage_endpoints
                 WHERE project_id = ?1 AND active = 1 AND shadow = 0
                 ORDER BY priority DESC, id ASC"
            ))?;
            let rows = stmt.query_map(params![project_id], row_to_endpoint)?;
            let mut endpoints = Vec::new();
            for row in rows {
                endpoints.push(row?);
            }
            if !endpoints.is_empty() {
                return Ok(endpoints);
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {ENDPOINT_COLUMNS} FROM storage_endpoints
                 WHERE project_id IS NULL AND active = 1 AND shadow = 0
                 ORDER BY priority DESC, id ASC"
            ))?;
            let rows = stmt.query_map(params![], row_to_endpoint)?;
            for row in rows {
                endpoints.push(row?);
            }
            Ok(endpoints)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Active shadow endpoints visible to a project (project-scoped plus
/// global).
pub async fn shadow_endpoints(
    db: &Database,
    project_id: &str,
) -> Result<Vec<StorageEndpoint>, RetraceError> {
    let project_id = project_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENDPOINT_COLUMNS} FROM storage_endpoints
                 WHERE (project_id = ?1 OR project_id IS NULL)
                   AND active = 1 AND shadow = 1
                 ORDER BY priority DESC, id ASC"
            ))?;
            let rows = stmt.query_map(params![project_id], row_to_endpoint)?;
            let mut endpoints = Vec::new();
            for row in rows {
                endpoints.push(row?);
            }
            Ok(endpoints)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
