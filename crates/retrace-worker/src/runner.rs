// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-job processing pipeline.
//!
//! claim -> load session + artifact -> pinned download -> kind extractor
//! -> persist -> complete. Failures go through the queue's backoff/DLQ
//! bookkeeping; the failure taxonomy decides whether a retry is allowed.

use std::sync::Arc;

use metrics::counter;
use retrace_core::RetraceError;
use retrace_core::time::{fmt_ts, parse_ts};
use retrace_core::types::{IssueRecord, JobStatus};
use retrace_extract::Extraction;
use retrace_storage::queries::{artifacts, crashes, heatmaps, jobs, metrics as metric_queries, sessions, stats};
use retrace_storage::{Job, Session};
use tracing::{debug, info, warn};

use crate::context::WorkerContext;
use crate::triggers;

/// What happened to one job in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Someone else claimed it first.
    Skipped,
    Done,
    /// Failed, retry scheduled with backoff.
    Retrying,
    DeadLettered,
}

/// Claim and process one job end to end.
pub async fn run_job(ctx: &Arc<WorkerContext>, job: &Job) -> Result<JobOutcome, RetraceError> {
    let Some(attempts) = jobs::claim(&ctx.db, &job.id).await? else {
        return Ok(JobOutcome::Skipped);
    };
    debug!(job_id = %job.id, attempts, kind = %job.kind, "processing job");

    match execute(ctx, job).await {
        Ok(()) => {
            jobs::complete(&ctx.db, &job.id).await?;
            counter!("retrace_jobs_completed").increment(1);

            if jobs::outstanding_for_session(&ctx.db, &job.session_id).await? == 0 {
                let duration = sessions::get_session(&ctx.db, &job.session_id)
                    .await?
                    .and_then(|s| s.duration_seconds)
                    .unwrap_or(0);
                triggers::fire_completion(ctx, &job.session_id, &job.project_id, duration);
            }
            Ok(JobOutcome::Done)
        }
        Err(e) => {
            // Terminal failures skip the retry budget entirely.
            let max_attempts = if e.is_transient() {
                ctx.worker.max_attempts
            } else {
                0
            };
            let now = fmt_ts(ctx.clock.now());
            let status = jobs::fail(&ctx.db, &job.id, &e.to_string(), max_attempts, &now).await?;
            if status == JobStatus::Dlq {
                counter!("retrace_jobs_dead_lettered").increment(1);
                warn!(job_id = %job.id, error = %e, "job dead-lettered");
                Ok(JobOutcome::DeadLettered)
            } else {
                counter!("retrace_jobs_retried").increment(1);
                info!(job_id = %job.id, attempts, error = %e, "job failed, retry scheduled");
                Ok(JobOutcome::Retrying)
            }
        }
    }
}

async fn execute(ctx: &Arc<WorkerContext>, job: &Job) -> Result<(), RetraceError> {
    let session = sessions::get_session(&ctx.db, &job.session_id)
        .await?
        .ok_or_else(|| RetraceError::MissingDependency {
            entity: "session",
            id: job.session_id.clone(),
        })?;
    metric_queries::ensure_metrics(&ctx.db, &job.session_id).await?;

    let artifact = artifacts::get_artifact(&ctx.db, &job.artifact_id)
        .await?
        .ok_or_else(|| RetraceError::MissingDependency {
            entity: "artifact",
            id: job.artifact_id.clone(),
        })?;

    let body = match ctx
        .store
        .download(
            &job.project_id,
            artifact.endpoint_id.as_deref(),
            &artifact.object_key,
        )
        .await
    {
        Ok(body) => body,
        // A missing object is not a job failure: the artifact is closed
        // out empty rather than retried forever against a blob that will
        // never appear.
        Err(RetraceError::NotFound { key }) => {
            debug!(job_id = %job.id, key, "object missing, closing artifact empty");
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    if !body.is_empty() {
        let extraction =
            retrace_extract::extract(job.kind, &job.project_id, &job.session_id, &body)?;
        apply(ctx, job, &session, extraction).await?;
    }

    artifacts::mark_ready(&ctx.db, &job.artifact_id).await?;
    Ok(())
}

async fn apply(
    ctx: &Arc<WorkerContext>,
    job: &Job,
    session: &Session,
    extraction: Extraction,
) -> Result<(), RetraceError> {
    match extraction {
        Extraction::Events(summary) => {
            metric_queries::apply_delta(&ctx.db, &job.session_id, &summary.metrics).await?;

            let date = ctx.clock.now().format("%Y-%m-%d").to_string();
            for (screen, delta) in &summary.heatmaps {
                heatmaps::merge_heatmap(&ctx.db, &job.project_id, screen, &date, delta).await?;
            }
            for rollup in &summary.api_rollups {
                stats::bump_api_endpoint_stats(
                    &ctx.db,
                    &job.project_id,
                    &rollup.endpoint,
                    &date,
                    rollup.calls,
                    rollup.errors,
                    rollup.latency_sum_ms,
                )
                .await?;
            }
        }
        Extraction::Crashes(reports) | Extraction::Anrs(reports) => {
            for report in reports {
                // Crash payloads can reference a session whose record has
                // not been uploaded yet.
                if report.session_id != job.session_id
                    && sessions::get_session(&ctx.db, &report.session_id)
                        .await?
                        .is_none()
                {
                    sessions::create_placeholder(
                        &ctx.db,
                        &report.session_id,
                        &job.project_id,
                        &session.team_id,
                        &report.occurred_at,
                    )
                    .await?;
                }

                crashes::insert_report(&ctx.db, &report).await?;

                let date = &report.occurred_at[..10.min(report.occurred_at.len())];
                let (crash_inc, anr_inc) = if report.kind == "anr" { (0, 1) } else { (1, 0) };
                stats::bump_daily_stats(&ctx.db, &job.project_id, date, crash_inc, anr_inc)
                    .await?;

                let issues = Arc::clone(&ctx.issues);
                let record = IssueRecord {
                    project_id: report.project_id.clone(),
                    session_id: report.session_id.clone(),
                    kind: report.kind.clone(),
                    fingerprint: report.fingerprint.clone(),
                    title: report.exception_name.clone(),
                    message: report.message.clone(),
                };
                triggers::spawn_detached("issue-sink", async move {
                    issues.submit(record).await
                });
            }
        }
        Extraction::Screenshots(summary) => {
            sessions::add_screenshot_counters(
                &ctx.db,
                &job.session_id,
                summary.segment_count,
                summary.byte_count,
            )
            .await?;

            if let (Some(recorded_end), Some(current_end)) =
                (&summary.recorded_end_at, &session.ended_at)
            {
                if recorded_end > current_end {
                    let (Some(end), Some(start)) =
                        (parse_ts(recorded_end), parse_ts(&session.started_at))
                    else {
                        return Err(RetraceError::Payload(format!(
                            "unparseable session timestamps for {}",
                            job.session_id
                        )));
                    };
                    let duration = (end - start).num_seconds().max(1);
                    if sessions::extend_end(&ctx.db, &job.session_id, recorded_end, duration)
                        .await?
                    {
                        // The replay frame index is keyed to the old end.
                        ctx.cache
                            .delete(&format!("frames:{}", job.session_id))
                            .await?;
                    }
                }
            }
        }
        Extraction::Hierarchy(summary) => {
            sessions::add_screenshot_counters(&ctx.db, &job.session_id, 0, summary.byte_count)
                .await?;
        }
    }
    Ok(())
}
