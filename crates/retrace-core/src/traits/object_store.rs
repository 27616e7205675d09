// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Object-storage trait for artifact upload, pinned download, and erasure.

use async_trait::async_trait;

use crate::error::RetraceError;
use crate::types::ArtifactKind;

/// Result of an artifact upload: which endpoint received the primary write.
///
/// The endpoint id must be recorded on the artifact row -- it is the only
/// way downloads can be located after the fact.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub endpoint_id: String,
    pub size_bytes: u64,
}

/// Multi-endpoint artifact storage.
///
/// Uploads go to a weighted-selected primary endpoint and are replicated
/// best-effort to shadow endpoints. Downloads are pinned: given the endpoint
/// an artifact was written to, the read goes to exactly that endpoint.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `body` under `key` for the given project, returning the
    /// endpoint that received the primary write.
    async fn upload(
        &self,
        project_id: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<UploadReceipt, RetraceError>;

    /// Download `key`, pinned to `endpoint_id` when one is recorded.
    /// `None` falls back to the project's current default resolution
    /// (legacy artifacts only).
    async fn download(
        &self,
        project_id: &str,
        endpoint_id: Option<&str>,
        key: &str,
    ) -> Result<Vec<u8>, RetraceError>;

    /// Delete every object under `prefix` from the primary endpoint and all
    /// shadow endpoints for the project. When `kind_guard` is set, each
    /// listed key must match that kind's expected path/extension pattern
    /// before it is deleted -- a safety net against purging the wrong class
    /// of object.
    async fn purge_prefix(
        &self,
        project_id: &str,
        prefix: &str,
        kind_guard: Option<ArtifactKind>,
    ) -> Result<u64, RetraceError>;
}
