// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator implementations for standalone deployments.
//!
//! The pipeline notifies these seams but does not own what sits behind
//! them. A standalone ingest daemon has no replay service, issue tracker,
//! or billing system attached, so most calls are recorded in the log and
//! acknowledged. The exception is [`FramePrewarmer`]: frame prewarming is
//! served locally out of the shared cache, guarded by the stampede lock.
//! Embedders replace these with real integrations when they build the
//! [`retrace_worker::WorkerContext`].

use std::sync::Arc;

use async_trait::async_trait;
use retrace_cache::{CacheLock, LockOptions};
use retrace_core::RetraceError;
use retrace_core::traits::{
    CacheAdapter, IssueSink, PromotionEvaluator, SessionHooks, UsageRecorder,
};
use retrace_core::types::{IssueRecord, PromotionDecision, UsageDelta};
use retrace_storage::{Database, queries::sessions};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Declines every promotion; standalone deployments keep nothing in the
/// replay tier unless an embedder wires in a real evaluator.
pub struct LogPromotionEvaluator;

#[async_trait]
impl PromotionEvaluator for LogPromotionEvaluator {
    async fn evaluate(
        &self,
        session_id: &str,
        project_id: &str,
        duration_seconds: i64,
    ) -> Result<PromotionDecision, RetraceError> {
        debug!(session_id, project_id, duration_seconds, "promotion evaluated (log-only)");
        Ok(PromotionDecision {
            promoted: false,
            reason: "no promotion evaluator configured".to_string(),
        })
    }
}

/// Writes issue records to the log instead of an issue tracker.
pub struct LogIssueSink;

#[async_trait]
impl IssueSink for LogIssueSink {
    async fn submit(&self, record: IssueRecord) -> Result<(), RetraceError> {
        info!(
            project_id = %record.project_id,
            session_id = %record.session_id,
            kind = %record.kind,
            fingerprint = %record.fingerprint,
            title = %record.title,
            "issue recorded"
        );
        Ok(())
    }
}

/// Logs usage deltas instead of forwarding them to billing.
pub struct LogUsageRecorder;

#[async_trait]
impl UsageRecorder for LogUsageRecorder {
    async fn record(&self, project_id: &str, delta: UsageDelta) -> Result<(), RetraceError> {
        info!(
            project_id,
            request_count = delta.request_count,
            minutes_recorded = delta.minutes_recorded,
            "usage recorded"
        );
        Ok(())
    }
}

/// Summary of a session's screenshot frames, cached under
/// `frames:{session_id}`. The worker invalidates that key whenever late
/// screenshots extend the session, so a prewarm after completion always
/// recomputes from the current row.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameIndex {
    pub segment_count: i64,
    pub byte_count: i64,
    pub duration_seconds: i64,
}

/// Post-completion hooks backed by the shared cache.
///
/// `prewarm_frames` computes the session's [`FrameIndex`] under the
/// stampede lock and leaves it in the cache, so the first replay request
/// after ingest finds it hot. Funnel analysis has no local consumer and
/// stays log-only.
pub struct FramePrewarmer {
    db: Database,
    lock: CacheLock<Arc<dyn CacheAdapter>>,
}

impl FramePrewarmer {
    pub fn new(db: Database, cache: Arc<dyn CacheAdapter>, options: LockOptions) -> Self {
        Self {
            db,
            lock: CacheLock::new(cache, options),
        }
    }
}

#[async_trait]
impl SessionHooks for FramePrewarmer {
    async fn prewarm_frames(&self, session_id: &str) -> Result<(), RetraceError> {
        let key = format!("frames:{session_id}");
        let index: FrameIndex = self
            .lock
            .with_refresh(&key, || async {
                let session = sessions::get_session(&self.db, session_id)
                    .await?
                    .ok_or_else(|| RetraceError::MissingDependency {
                        entity: "session",
                        id: session_id.to_string(),
                    })?;
                Ok(FrameIndex {
                    segment_count: session.screenshot_segments,
                    byte_count: session.screenshot_bytes,
                    duration_seconds: session.duration_seconds.unwrap_or(0),
                })
            })
            .await?;
        debug!(
            session_id,
            segments = index.segment_count,
            bytes = index.byte_count,
            "frame index prewarmed"
        );
        Ok(())
    }

    async fn analyze_funnels(&self, project_id: &str) -> Result<(), RetraceError> {
        debug!(project_id, "funnel analysis requested (log-only)");
        Ok(())
    }
}
