// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Traits for external collaborators the pipeline notifies but does not own.
//!
//! Promotion evaluation, issue tracking, device-usage accounting, and the
//! prewarm/funnel triggers all live behind these seams. Calls on them are
//! fire-and-forget from the worker's point of view: failures are logged by
//! the background trigger pool and never fail the triggering job.

use async_trait::async_trait;

use crate::error::RetraceError;
use crate::types::{IssueRecord, PromotionDecision, UsageDelta};

/// Decides whether a finished session is promoted into replay retention.
///
/// Invoked once per session, after its last outstanding job completes or
/// the auto-finalizer closes it. Both paths use the same scoring so
/// retention decisions are consistent regardless of how the session ended.
#[async_trait]
pub trait PromotionEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        session_id: &str,
        project_id: &str,
        duration_seconds: i64,
    ) -> Result<PromotionDecision, RetraceError>;
}

/// Accepts crash/error/ANR records for grouping and alerting.
#[async_trait]
pub trait IssueSink: Send + Sync {
    async fn submit(&self, record: IssueRecord) -> Result<(), RetraceError>;
}

/// Device-usage accounting for billing counters.
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record(&self, project_id: &str, delta: UsageDelta) -> Result<(), RetraceError>;
}

/// Best-effort post-completion triggers.
#[async_trait]
pub trait SessionHooks: Send + Sync {
    /// Pre-render the screenshot frame index for a session whose processing
    /// just finished.
    async fn prewarm_frames(&self, session_id: &str) -> Result<(), RetraceError>;

    /// Refresh derived funnel ("happy path") analysis for a project.
    /// Triggered lazily on a small fraction of completions.
    async fn analyze_funnels(&self, project_id: &str) -> Result<(), RetraceError>;
}
