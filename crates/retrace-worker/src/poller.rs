// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The polling loop: select due jobs, deduplicate by session, fan out.
//!
//! Batches run serially; jobs within a batch run on a fixed-size task pool
//! sharing an atomic cursor. Session dedup means at most one job per
//! session per batch, which is what lets metric updates within a batch
//! avoid cross-job interleaving on the same session.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use metrics::gauge;
use retrace_core::RetraceError;
use retrace_core::time::fmt_ts;
use retrace_storage::Job;
use retrace_storage::queries::jobs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::context::WorkerContext;
use crate::runner;

/// Run the poll loop until cancelled. The in-flight batch always completes
/// before the loop exits.
pub async fn run(ctx: Arc<WorkerContext>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(ctx.worker.poll_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(
        concurrency = ctx.worker.concurrency,
        poll_interval_secs = ctx.worker.poll_interval_secs,
        "worker poll loop started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        match run_batch(&ctx).await {
            Ok(0) => {}
            Ok(n) => debug!(jobs = n, "batch complete"),
            Err(e) => error!(error = %e, "polling pass failed"),
        }
    }
    info!("worker poll loop stopped");
}

/// One polling pass. Returns the number of jobs processed.
pub async fn run_batch(ctx: &Arc<WorkerContext>) -> Result<usize, RetraceError> {
    let now = fmt_ts(ctx.clock.now());
    let batch = jobs::due_batch(&ctx.db, &now, ctx.worker.batch_size).await?;
    if batch.is_empty() {
        return Ok(0);
    }

    let batch = dedup_by_session(batch);
    gauge!("retrace_batch_size").set(batch.len() as f64);

    let batch = Arc::new(batch);
    let cursor = Arc::new(AtomicUsize::new(0));
    let workers = ctx.worker.concurrency.max(1).min(batch.len());

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let ctx = Arc::clone(ctx);
        let batch = Arc::clone(&batch);
        let cursor = Arc::clone(&cursor);
        handles.push(tokio::spawn(async move {
            loop {
                let idx = cursor.fetch_add(1, Ordering::SeqCst);
                let Some(job) = batch.get(idx) else { break };
                if let Err(e) = runner::run_job(&ctx, job).await {
                    // Bookkeeping failure, not a job failure: the claim
                    // row may be left processing until the next sweep.
                    error!(job_id = %job.id, error = %e, "job bookkeeping failed");
                }
            }
        }));
    }
    for handle in handles {
        // Worker tasks never panic in normal operation; a panic here is a
        // bug worth surfacing loudly.
        if let Err(e) = handle.await {
            error!(error = %e, "worker task panicked");
        }
    }

    Ok(batch.len())
}

/// Keep the first (oldest) job per session; later ones wait for the next
/// pass.
fn dedup_by_session(batch: Vec<Job>) -> Vec<Job> {
    let mut seen = HashSet::new();
    batch
        .into_iter()
        .filter(|job| seen.insert(job.session_id.clone()))
        .collect()
}
