// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget completion triggers.
//!
//! Promotion evaluation, frame prewarm, and funnel analysis run detached:
//! their failures are logged and never fail or delay the job that fired
//! them.

use std::future::Future;
use std::sync::Arc;

use rand::Rng;
use retrace_core::RetraceError;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::context::WorkerContext;

/// Fraction of session completions that trigger funnel analysis. Funnels
/// are derived lazily; refreshing on every completion would be wasted work.
pub const FUNNEL_SAMPLE_RATE: f64 = 0.05;

/// Cap on concurrently running background triggers. A flood of session
/// completions queues its triggers instead of spawning them all at once.
const TRIGGER_POOL_LIMIT: usize = 32;

static TRIGGER_PERMITS: Semaphore = Semaphore::const_new(TRIGGER_POOL_LIMIT);

/// Spawn a background task whose failure is logged, never propagated.
pub fn spawn_detached<F>(task: &'static str, fut: F)
where
    F: Future<Output = Result<(), RetraceError>> + Send + 'static,
{
    tokio::spawn(async move {
        // Never closed, so acquire can only fail if the semaphore is
        // poisoned at shutdown; skipping the trigger is fine then.
        let Ok(_permit) = TRIGGER_PERMITS.acquire().await else {
            return;
        };
        if let Err(e) = fut.await {
            warn!(task, error = %e, "background trigger failed");
        }
    });
}

/// Fire the post-completion triggers for a session whose last outstanding
/// job just finished.
pub fn fire_completion(
    ctx: &Arc<WorkerContext>,
    session_id: &str,
    project_id: &str,
    duration_seconds: i64,
) {
    let session_id = session_id.to_string();
    let project_id = project_id.to_string();

    {
        let ctx = Arc::clone(ctx);
        let session_id = session_id.clone();
        let project_id = project_id.clone();
        spawn_detached("promotion", async move {
            let decision = ctx
                .promotion
                .evaluate(&session_id, &project_id, duration_seconds)
                .await?;
            debug!(
                session_id,
                promoted = decision.promoted,
                reason = %decision.reason,
                "promotion evaluated"
            );
            Ok(())
        });
    }

    {
        let ctx = Arc::clone(ctx);
        let session_id = session_id.clone();
        spawn_detached("prewarm", async move {
            ctx.hooks.prewarm_frames(&session_id).await
        });
    }

    if rand::thread_rng().r#gen::<f64>() < FUNNEL_SAMPLE_RATE {
        let ctx = Arc::clone(ctx);
        spawn_detached("funnels", async move {
            ctx.hooks.analyze_funnels(&project_id).await
        });
    }
}
