// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The auto-finalizer: closes sessions whose producer went silent.
//!
//! Mobile sessions end without ceremony -- the app is killed, the device
//! loses signal -- so an explicit close never arrives. The sweep finds
//! processing sessions whose artifacts have gone stale, closes them from
//! the last artifact's timestamp, recovers orphaned artifacts, and runs
//! the same usage accounting and promotion evaluation as the explicit
//! close path.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use metrics::counter;
use retrace_core::RetraceError;
use retrace_core::time::{fmt_ts, parse_ts};
use retrace_core::types::UsageDelta;
use retrace_storage::Session;
use retrace_storage::queries::{artifacts, jobs, sessions};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::context::WorkerContext;

/// Upper bound on sessions finalized per sweep.
const SWEEP_LIMIT: u32 = 50;

/// Run the sweep loop until cancelled.
pub async fn run(ctx: Arc<WorkerContext>, cancel: CancellationToken) {
    let mut interval =
        tokio::time::interval(Duration::from_secs(ctx.finalizer.sweep_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(
        sweep_interval_secs = ctx.finalizer.sweep_interval_secs,
        staleness_secs = ctx.finalizer.staleness_secs,
        "auto-finalizer started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        match sweep(&ctx).await {
            Ok(0) => {}
            Ok(n) => debug!(sessions = n, "finalizer sweep closed sessions"),
            Err(e) => error!(error = %e, "finalizer sweep failed"),
        }
    }
    info!("auto-finalizer stopped");
}

/// One sweep pass. Returns how many sessions were finalized.
pub async fn sweep(ctx: &Arc<WorkerContext>) -> Result<usize, RetraceError> {
    let now = ctx.clock.now();
    let guard_cutoff = fmt_ts(now - ChronoDuration::seconds(ctx.finalizer.guard_secs));
    let staleness_cutoff = fmt_ts(now - ChronoDuration::seconds(ctx.finalizer.staleness_secs));

    let candidates =
        sessions::finalizer_candidates(&ctx.db, &guard_cutoff, &staleness_cutoff, SWEEP_LIMIT)
            .await?;

    let mut finalized = 0;
    for session in candidates {
        match finalize_session(ctx, &session).await {
            Ok(true) => finalized += 1,
            Ok(false) => {}
            Err(e) => warn!(session_id = %session.id, error = %e, "finalization failed"),
        }
    }
    if finalized > 0 {
        counter!("retrace_sessions_auto_finalized").increment(finalized as u64);
    }
    Ok(finalized)
}

/// Close one stale session. Idempotent: finalizing an already-closed
/// session is a no-op (another sweep or the explicit path won the race).
pub async fn finalize_session(
    ctx: &Arc<WorkerContext>,
    session: &Session,
) -> Result<bool, RetraceError> {
    let Some(ended_at) = artifacts::last_artifact_at(&ctx.db, &session.id).await? else {
        return Ok(false);
    };
    let (Some(end), Some(start)) = (parse_ts(&ended_at), parse_ts(&session.started_at)) else {
        return Err(RetraceError::Internal(format!(
            "unparseable timestamps on session {}",
            session.id
        )));
    };
    let duration_seconds = (end - start).num_seconds().max(1);

    if !sessions::finalize(&ctx.db, &session.id, &ended_at, duration_seconds).await? {
        return Ok(false);
    }
    info!(session_id = %session.id, duration_seconds, "session auto-finalized");

    // Same accounting deltas as the explicit close path, so billing does
    // not depend on which path closed the session.
    if let Err(e) = ctx
        .usage
        .record(
            &session.project_id,
            UsageDelta {
                request_count: 1,
                minutes_recorded: duration_seconds as f64 / 60.0,
            },
        )
        .await
    {
        warn!(session_id = %session.id, error = %e, "usage recording failed");
    }

    recover_artifacts(ctx, session).await?;

    match ctx
        .promotion
        .evaluate(&session.id, &session.project_id, duration_seconds)
        .await
    {
        Ok(decision) => {
            debug!(
                session_id = %session.id,
                promoted = decision.promoted,
                reason = %decision.reason,
                "promotion evaluated"
            );
        }
        Err(e) => warn!(session_id = %session.id, error = %e, "promotion evaluation failed"),
    }

    Ok(true)
}

/// Mark orphaned pending artifacts ready and queue a job for each, unless
/// one already exists for that artifact id.
async fn recover_artifacts(
    ctx: &Arc<WorkerContext>,
    session: &Session,
) -> Result<(), RetraceError> {
    for artifact in artifacts::pending_for_session(&ctx.db, &session.id).await? {
        if jobs::exists_for_artifact(&ctx.db, &artifact.id).await? {
            continue;
        }
        let job = retrace_storage::Job {
            id: Uuid::new_v4().to_string(),
            project_id: session.project_id.clone(),
            session_id: session.id.clone(),
            artifact_id: artifact.id.clone(),
            kind: artifact.kind,
            payload_ref: artifact.object_key.clone(),
            status: retrace_core::types::JobStatus::Pending,
            attempts: 0,
            next_run_at: None,
            error_msg: None,
            created_at: fmt_ts(ctx.clock.now()),
            updated_at: fmt_ts(ctx.clock.now()),
        };
        jobs::insert_job(&ctx.db, &job).await?;
        artifacts::mark_ready(&ctx.db, &artifact.id).await?;
        debug!(
            session_id = %session.id,
            artifact_id = %artifact.id,
            "recovered orphaned artifact"
        );
    }
    Ok(())
}
