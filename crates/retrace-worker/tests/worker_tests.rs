// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end worker and finalizer tests over a real (temp) database and
//! an in-memory object store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use retrace_cache::MemoryCache;
use retrace_config::{FinalizerConfig, WorkerConfig};
use retrace_core::traits::CacheAdapter;
use retrace_core::types::{ArtifactKind, ArtifactStatus, JobStatus, SessionStatus};
use retrace_storage::queries::{artifacts, jobs, metrics, sessions, stats};
use retrace_storage::Database;
use retrace_test_utils::{
    MemoryObjectStore, RecordingHooks, RecordingIssueSink, RecordingPromotionEvaluator,
    RecordingUsageRecorder, ManualClock, artifact_fixture, job_fixture, session_fixture, temp_db,
};
use retrace_worker::{WorkerContext, finalizer, poller, runner};

struct Harness {
    ctx: Arc<WorkerContext>,
    store: Arc<MemoryObjectStore>,
    cache: Arc<MemoryCache>,
    clock: Arc<ManualClock>,
    promotion: Arc<RecordingPromotionEvaluator>,
    issues: Arc<RecordingIssueSink>,
    usage: Arc<RecordingUsageRecorder>,
    hooks: Arc<RecordingHooks>,
    db: Database,
    _dir: tempfile::TempDir,
}

async fn harness() -> Harness {
    let (db, dir) = temp_db().await;
    let store = Arc::new(MemoryObjectStore::new());
    let cache = Arc::new(MemoryCache::new());
    let clock = Arc::new(ManualClock::epoch_2026());
    let promotion = Arc::new(RecordingPromotionEvaluator::promoting());
    let issues = Arc::new(RecordingIssueSink::default());
    let usage = Arc::new(RecordingUsageRecorder::default());
    let hooks = Arc::new(RecordingHooks::default());

    let ctx = Arc::new(WorkerContext {
        db: db.clone(),
        store: store.clone(),
        cache: cache.clone(),
        clock: clock.clone(),
        promotion: promotion.clone(),
        issues: issues.clone(),
        usage: usage.clone(),
        hooks: hooks.clone(),
        worker: WorkerConfig::default(),
        finalizer: FinalizerConfig::default(),
    });

    Harness {
        ctx,
        store,
        cache,
        clock,
        promotion,
        issues,
        usage,
        hooks,
        db,
        _dir: dir,
    }
}

const EVENTS_BODY: &[u8] = br#"{"events":[
    {"type":"navigation","screenName":"Home","timestamp":1000},
    {"type":"touch","timestamp":1100,"x":100.0,"y":200.0,"screenWidth":375.0,"screenHeight":812.0},
    {"type":"touch","timestamp":1300,"x":105.0,"y":202.0,"screenWidth":375.0,"screenHeight":812.0},
    {"type":"api_call","endpoint":"GET /items","statusCode":500,"durationMs":80.0}
]}"#;

async fn seed_events_job(h: &Harness, job_id: &str, session_id: &str, artifact_id: &str) {
    if sessions::get_session(&h.db, session_id).await.unwrap().is_none() {
        sessions::create_session(&h.db, &session_fixture(session_id, "p1")).await.unwrap();
        metrics::ensure_metrics(&h.db, session_id).await.unwrap();
    }
    let key = format!("tenant/t1/project/p1/sessions/{session_id}/events/{artifact_id}.json");
    let artifact = artifact_fixture(artifact_id, session_id, ArtifactKind::Events, &key);
    artifacts::insert_artifact(&h.db, &artifact).await.unwrap();
    jobs::insert_job(&h.db, &job_fixture(job_id, "p1", &artifact)).await.unwrap();
    h.store.put(&key, EVENTS_BODY.to_vec());
}

#[tokio::test]
async fn events_job_processes_end_to_end() {
    let h = harness().await;
    seed_events_job(&h, "j1", "s1", "a1").await;

    let processed = poller::run_batch(&h.ctx).await.unwrap();
    assert_eq!(processed, 1);

    let job = jobs::get_job(&h.db, "j1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.attempts, 1);

    let artifact = artifacts::get_artifact(&h.db, "a1").await.unwrap().unwrap();
    assert_eq!(artifact.status, ArtifactStatus::Ready);

    let m = metrics::get_metrics(&h.db, "s1").await.unwrap().unwrap();
    assert_eq!(m.touch_count, 2);
    assert_eq!(m.rage_tap_count, 1);
    assert_eq!(m.api_call_count, 1);
    assert_eq!(m.api_error_count, 1);
    assert_eq!(m.unique_screen_count, 1);

    let api = stats::get_api_endpoint_stats(&h.db, "p1", "GET /items", "2026-01-01")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(api, (1, 1, 80.0));

    h.db.close().await.unwrap();
}

#[tokio::test]
async fn no_job_is_left_processing_after_a_batch() {
    let h = harness().await;
    seed_events_job(&h, "j1", "s1", "a1").await;
    seed_events_job(&h, "j2", "s2", "a2").await;
    // j3's object is broken so the job fails.
    seed_events_job(&h, "j3", "s3", "a3").await;
    h.store.fail_downloads("tenant/t1/project/p1/sessions/s3/events/a3.json");

    poller::run_batch(&h.ctx).await.unwrap();

    for id in ["j1", "j2", "j3"] {
        let job = jobs::get_job(&h.db, id).await.unwrap().unwrap();
        assert_ne!(job.status, JobStatus::Processing, "{id} left processing");
    }

    h.db.close().await.unwrap();
}

#[tokio::test]
async fn repeated_download_failures_dead_letter_and_leave_artifact_pending() {
    let h = harness().await;
    seed_events_job(&h, "j1", "s1", "a1").await;
    h.store.fail_downloads("tenant/t1/project/p1/sessions/s1/events/a1.json");

    // Three attempts with the clock jumped past each backoff window.
    for attempt in 1..=3 {
        let processed = poller::run_batch(&h.ctx).await.unwrap();
        assert_eq!(processed, 1, "attempt {attempt} did not run");
        let job = jobs::get_job(&h.db, "j1").await.unwrap().unwrap();
        assert_eq!(job.attempts, attempt);
        assert!(job.attempts <= 3);
        h.clock.advance(ChronoDuration::hours(1));
    }

    let job = jobs::get_job(&h.db, "j1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Dlq);
    assert!(job.error_msg.is_some());

    // The artifact was never processed, so it must still be pending.
    let artifact = artifacts::get_artifact(&h.db, "a1").await.unwrap().unwrap();
    assert_eq!(artifact.status, ArtifactStatus::Pending);

    // A dead-lettered job never becomes due again.
    assert_eq!(poller::run_batch(&h.ctx).await.unwrap(), 0);

    h.db.close().await.unwrap();
}

#[tokio::test]
async fn missing_session_dead_letters_immediately() {
    let h = harness().await;
    let key = "tenant/t1/project/p1/sessions/ghost/events/a1.json";
    let artifact = artifact_fixture("a1", "ghost", ArtifactKind::Events, key);
    artifacts::insert_artifact(&h.db, &artifact).await.unwrap();
    jobs::insert_job(&h.db, &job_fixture("j1", "p1", &artifact)).await.unwrap();
    h.store.put(key, EVENTS_BODY.to_vec());

    poller::run_batch(&h.ctx).await.unwrap();

    let job = jobs::get_job(&h.db, "j1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Dlq);
    assert_eq!(job.attempts, 1, "terminal failure must not burn retries");

    h.db.close().await.unwrap();
}

#[tokio::test]
async fn missing_object_closes_the_artifact_empty() {
    let h = harness().await;
    sessions::create_session(&h.db, &session_fixture("s1", "p1")).await.unwrap();
    let artifact = artifact_fixture("a1", "s1", ArtifactKind::Events, "never/uploaded.json");
    artifacts::insert_artifact(&h.db, &artifact).await.unwrap();
    jobs::insert_job(&h.db, &job_fixture("j1", "p1", &artifact)).await.unwrap();

    poller::run_batch(&h.ctx).await.unwrap();

    let job = jobs::get_job(&h.db, "j1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    let artifact = artifacts::get_artifact(&h.db, "a1").await.unwrap().unwrap();
    assert_eq!(artifact.status, ArtifactStatus::Ready);

    h.db.close().await.unwrap();
}

#[tokio::test]
async fn promotion_fires_exactly_once_after_the_last_job() {
    let h = harness().await;
    seed_events_job(&h, "j1", "s1", "a1").await;
    seed_events_job(&h, "j2", "s1", "a2").await;
    seed_events_job(&h, "j3", "s1", "a3").await;

    // Session dedup processes one job per batch.
    for expected_remaining in [2i64, 1, 0] {
        poller::run_batch(&h.ctx).await.unwrap();
        assert_eq!(
            jobs::outstanding_for_session(&h.db, "s1").await.unwrap(),
            expected_remaining
        );
    }

    // Triggers are detached; give them a moment.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.promotion.call_count(), 1);
    assert_eq!(h.hooks.prewarms.load(std::sync::atomic::Ordering::SeqCst), 1);

    h.db.close().await.unwrap();
}

#[tokio::test]
async fn crash_job_creates_placeholder_and_forwards_issues() {
    let h = harness().await;
    sessions::create_session(&h.db, &session_fixture("s1", "p1")).await.unwrap();

    let body = br#"{"crashes":[{
        "sessionId":"s-early",
        "exceptionName":"NSRangeException",
        "message":"index 5 beyond bounds",
        "timestamp":1767225600000
    }]}"#;
    let key = "tenant/t1/project/p1/sessions/s1/crashes/a1.json";
    let artifact = artifact_fixture("a1", "s1", ArtifactKind::Crashes, key);
    artifacts::insert_artifact(&h.db, &artifact).await.unwrap();
    jobs::insert_job(&h.db, &job_fixture("j1", "p1", &artifact)).await.unwrap();
    h.store.put(key, body.to_vec());

    poller::run_batch(&h.ctx).await.unwrap();

    // The crash referenced a session that did not exist yet.
    let placeholder = sessions::get_session(&h.db, "s-early").await.unwrap().unwrap();
    assert_eq!(placeholder.status, SessionStatus::Processing);
    assert!(metrics::get_metrics(&h.db, "s-early").await.unwrap().is_some());

    assert_eq!(
        stats::get_daily_stats(&h.db, "p1", "2026-01-01").await.unwrap(),
        Some((1, 0))
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    let records = h.issues.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, "crash");
    assert_eq!(records[0].session_id, "s-early");
    assert_eq!(records[0].fingerprint.len(), 64);

    h.db.close().await.unwrap();
}

#[tokio::test]
async fn late_screenshots_extend_the_session_and_invalidate_frames() {
    let h = harness().await;
    sessions::create_session(&h.db, &session_fixture("s1", "p1")).await.unwrap();
    sessions::finalize(&h.db, "s1", "2026-01-01T00:01:00.000Z", 60).await.unwrap();
    h.cache
        .set_ttl("frames:s1", "cached-index", Duration::from_secs(600))
        .await
        .unwrap();

    // Manifest recorded through 00:02:00, one minute past the close.
    let body = br#"{"segmentCount":3,"byteCount":40960,"recordedEnd":1767225720000}"#;
    let key = "tenant/t1/project/p1/sessions/s1/screenshots/a1.json";
    let artifact = artifact_fixture("a1", "s1", ArtifactKind::Screenshots, key);
    artifacts::insert_artifact(&h.db, &artifact).await.unwrap();
    jobs::insert_job(&h.db, &job_fixture("j1", "p1", &artifact)).await.unwrap();
    h.store.put(key, body.to_vec());

    poller::run_batch(&h.ctx).await.unwrap();

    let session = sessions::get_session(&h.db, "s1").await.unwrap().unwrap();
    assert_eq!(session.ended_at.as_deref(), Some("2026-01-01T00:02:00.000Z"));
    assert_eq!(session.duration_seconds, Some(120));
    assert_eq!(session.screenshot_segments, 3);
    assert_eq!(session.screenshot_bytes, 40960);

    assert_eq!(h.cache.get("frames:s1").await.unwrap(), None);

    h.db.close().await.unwrap();
}

#[tokio::test]
async fn finalizer_recovers_stale_sessions() {
    let h = harness().await;

    let mut session = session_fixture("s1", "p1");
    session.started_at = "2026-01-01T00:00:00.000Z".to_string();
    sessions::create_session(&h.db, &session).await.unwrap();

    let key = "tenant/t1/project/p1/sessions/s1/events/a1.json";
    let mut artifact = artifact_fixture("a1", "s1", ArtifactKind::Events, key);
    artifact.created_at = "2026-01-01T00:01:30.000Z".to_string();
    artifacts::insert_artifact(&h.db, &artifact).await.unwrap();
    h.store.put(key, EVENTS_BODY.to_vec());

    // Move well past guard + staleness windows.
    h.clock.advance(ChronoDuration::seconds(300));

    let finalized = finalizer::sweep(&h.ctx).await.unwrap();
    assert_eq!(finalized, 1);

    // End time comes from the last artifact, duration from session start.
    let session = sessions::get_session(&h.db, "s1").await.unwrap().unwrap();
    assert_eq!(session.ended_at.as_deref(), Some("2026-01-01T00:01:30.000Z"));
    assert_eq!(session.duration_seconds, Some(90));
    assert_eq!(session.status, SessionStatus::Ready);

    // The orphaned artifact got a recovery job.
    let artifact = artifacts::get_artifact(&h.db, "a1").await.unwrap().unwrap();
    assert_eq!(artifact.status, ArtifactStatus::Ready);
    assert_eq!(jobs::outstanding_for_session(&h.db, "s1").await.unwrap(), 1);

    // Usage accounting matches the explicit close path.
    let deltas = h.usage.deltas.lock().unwrap().clone();
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].0, "p1");
    assert_eq!(deltas[0].1.request_count, 1);
    assert!((deltas[0].1.minutes_recorded - 1.5).abs() < 1e-9);

    assert_eq!(h.promotion.call_count(), 1);

    h.db.close().await.unwrap();
}

#[tokio::test]
async fn finalizer_is_idempotent() {
    let h = harness().await;

    let mut session = session_fixture("s1", "p1");
    session.started_at = "2026-01-01T00:00:00.000Z".to_string();
    sessions::create_session(&h.db, &session).await.unwrap();
    let mut artifact = artifact_fixture("a1", "s1", ArtifactKind::Events, "k");
    artifact.created_at = "2026-01-01T00:01:00.000Z".to_string();
    artifacts::insert_artifact(&h.db, &artifact).await.unwrap();

    h.clock.advance(ChronoDuration::seconds(300));

    assert_eq!(finalizer::sweep(&h.ctx).await.unwrap(), 1);

    // Recovery created a job, so s1 is no longer a candidate; and even a
    // direct re-finalize of the same session is a no-op.
    assert_eq!(finalizer::sweep(&h.ctx).await.unwrap(), 0);
    let session = sessions::get_session(&h.db, "s1").await.unwrap().unwrap();
    assert!(
        !finalizer::finalize_session(&h.ctx, &session).await.unwrap(),
        "second finalization must be a no-op"
    );
    assert_eq!(h.promotion.call_count(), 1);
    assert_eq!(h.usage.deltas.lock().unwrap().len(), 1);

    h.db.close().await.unwrap();
}

#[tokio::test]
async fn respects_the_guard_window() {
    let h = harness().await;

    // Session started "now": inside the guard window, never finalized.
    let mut session = session_fixture("s1", "p1");
    session.started_at = "2026-01-01T00:00:00.000Z".to_string();
    sessions::create_session(&h.db, &session).await.unwrap();
    let artifact = artifact_fixture("a1", "s1", ArtifactKind::Events, "k");
    artifacts::insert_artifact(&h.db, &artifact).await.unwrap();

    h.clock.advance(ChronoDuration::seconds(10));
    assert_eq!(finalizer::sweep(&h.ctx).await.unwrap(), 0);

    h.db.close().await.unwrap();
}

#[tokio::test]
async fn skipped_claim_is_not_an_error() {
    let h = harness().await;
    seed_events_job(&h, "j1", "s1", "a1").await;

    let job = jobs::get_job(&h.db, "j1").await.unwrap().unwrap();
    jobs::claim(&h.db, "j1").await.unwrap();

    // The job is already processing; a second runner must skip it.
    let outcome = runner::run_job(&h.ctx, &job).await.unwrap();
    assert_eq!(outcome, runner::JobOutcome::Skipped);

    h.db.close().await.unwrap();
}
