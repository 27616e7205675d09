// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test doubles for the Retrace workspace: an in-memory object
//! store, recording collaborator mocks, a manual clock, and row fixtures.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use retrace_core::RetraceError;
use retrace_core::traits::{
    Clock, IssueSink, ObjectStore, PromotionEvaluator, SessionHooks, UploadReceipt, UsageRecorder,
};
use retrace_core::types::{
    ArtifactKind, ArtifactStatus, IssueRecord, JobStatus, PromotionDecision, SessionStatus,
    UsageDelta,
};
use retrace_storage::{Artifact, Database, Job, Session};

/// Open a migrated database in a fresh temp directory.
pub async fn temp_db() -> (Database, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::open(dir.path().join("retrace.db"))
        .await
        .expect("open database");
    (db, dir)
}

/// In-memory [`ObjectStore`] with per-key failure injection.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, Vec<u8>>,
    failing: DashMap<String, ()>,
    pub downloads: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, body: Vec<u8>) {
        self.objects.insert(key.to_string(), body);
    }

    /// Make every download of `key` fail with a transient error.
    pub fn fail_downloads(&self, key: &str) {
        self.failing.insert(key.to_string(), ());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(
        &self,
        _project_id: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<UploadReceipt, RetraceError> {
        let size_bytes = body.len() as u64;
        self.objects.insert(key.to_string(), body);
        Ok(UploadReceipt {
            endpoint_id: "mem-1".to_string(),
            size_bytes,
        })
    }

    async fn download(
        &self,
        _project_id: &str,
        _endpoint_id: Option<&str>,
        key: &str,
    ) -> Result<Vec<u8>, RetraceError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains_key(key) {
            return Err(RetraceError::object_store("injected download failure"));
        }
        self.objects
            .get(key)
            .map(|body| body.clone())
            .ok_or_else(|| RetraceError::NotFound {
                key: key.to_string(),
            })
    }

    async fn purge_prefix(
        &self,
        _project_id: &str,
        prefix: &str,
        kind_guard: Option<ArtifactKind>,
    ) -> Result<u64, RetraceError> {
        let doomed: Vec<String> = self
            .objects
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| key.starts_with(prefix))
            .filter(|key| match kind_guard {
                Some(kind) => key.contains(&format!("/{kind}/")),
                None => true,
            })
            .collect();
        for key in &doomed {
            self.objects.remove(key);
        }
        Ok(doomed.len() as u64)
    }
}

/// Records every evaluation; returns a fixed decision.
#[derive(Default)]
pub struct RecordingPromotionEvaluator {
    pub calls: Mutex<Vec<(String, String, i64)>>,
    pub promote: AtomicBool,
}

impl RecordingPromotionEvaluator {
    pub fn promoting() -> Self {
        let evaluator = Self::default();
        evaluator.promote.store(true, Ordering::SeqCst);
        evaluator
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PromotionEvaluator for RecordingPromotionEvaluator {
    async fn evaluate(
        &self,
        session_id: &str,
        project_id: &str,
        duration_seconds: i64,
    ) -> Result<PromotionDecision, RetraceError> {
        self.calls.lock().unwrap().push((
            session_id.to_string(),
            project_id.to_string(),
            duration_seconds,
        ));
        let promoted = self.promote.load(Ordering::SeqCst);
        Ok(PromotionDecision {
            promoted,
            reason: if promoted { "test" } else { "below threshold" }.to_string(),
        })
    }
}

/// Collects submitted issue records.
#[derive(Default)]
pub struct RecordingIssueSink {
    pub records: Mutex<Vec<IssueRecord>>,
}

impl RecordingIssueSink {
    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl IssueSink for RecordingIssueSink {
    async fn submit(&self, record: IssueRecord) -> Result<(), RetraceError> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

/// Collects usage deltas per project.
#[derive(Default)]
pub struct RecordingUsageRecorder {
    pub deltas: Mutex<Vec<(String, UsageDelta)>>,
}

#[async_trait]
impl UsageRecorder for RecordingUsageRecorder {
    async fn record(&self, project_id: &str, delta: UsageDelta) -> Result<(), RetraceError> {
        self.deltas
            .lock()
            .unwrap()
            .push((project_id.to_string(), delta));
        Ok(())
    }
}

/// Counts hook invocations.
#[derive(Default)]
pub struct RecordingHooks {
    pub prewarms: AtomicUsize,
    pub funnel_runs: AtomicUsize,
}

#[async_trait]
impl SessionHooks for RecordingHooks {
    async fn prewarm_frames(&self, _session_id: &str) -> Result<(), RetraceError> {
        self.prewarms.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn analyze_funnels(&self, _project_id: &str) -> Result<(), RetraceError> {
        self.funnel_runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A clock pinned to a settable instant.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Pinned to 2026-01-01T00:00:00Z.
    pub fn epoch_2026() -> Self {
        Self::at(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap() = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Fixture builders mirroring the ingest API's row creation.
pub fn session_fixture(id: &str, project_id: &str) -> Session {
    Session {
        id: id.to_string(),
        project_id: project_id.to_string(),
        team_id: "t1".to_string(),
        status: SessionStatus::Processing,
        started_at: "2026-01-01T00:00:00.000Z".to_string(),
        ended_at: None,
        duration_seconds: None,
        device_id: Some("device-1".to_string()),
        retention_tier: "standard".to_string(),
        screenshot_segments: 0,
        screenshot_bytes: 0,
        created_at: "2026-01-01T00:00:00.000Z".to_string(),
        updated_at: "2026-01-01T00:00:00.000Z".to_string(),
    }
}

pub fn artifact_fixture(id: &str, session_id: &str, kind: ArtifactKind, key: &str) -> Artifact {
    Artifact {
        id: id.to_string(),
        session_id: session_id.to_string(),
        kind,
        object_key: key.to_string(),
        endpoint_id: Some("mem-1".to_string()),
        status: ArtifactStatus::Pending,
        size_bytes: 0,
        created_at: "2026-01-01T00:00:00.000Z".to_string(),
        ready_at: None,
    }
}

pub fn job_fixture(id: &str, project_id: &str, artifact: &Artifact) -> Job {
    Job {
        id: id.to_string(),
        project_id: project_id.to_string(),
        session_id: artifact.session_id.clone(),
        artifact_id: artifact.id.clone(),
        kind: artifact.kind,
        payload_ref: artifact.object_key.clone(),
        status: JobStatus::Pending,
        attempts: 0,
        next_run_at: None,
        error_msg: None,
        created_at: "2026-01-01T00:00:00.000Z".to_string(),
        updated_at: "2026-01-01T00:00:00.000Z".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_honors_failure_injection() {
        let store = MemoryObjectStore::new();
        store.put("k", b"v".to_vec());
        assert_eq!(store.download("p1", None, "k").await.unwrap(), b"v");

        store.fail_downloads("k");
        assert!(store.download("p1", None, "k").await.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn memory_store_purge_respects_guard() {
        let store = MemoryObjectStore::new();
        store.put("s1/events/a.json", b"a".to_vec());
        store.put("s1/screenshots/b.bin", b"b".to_vec());

        let n = store
            .purge_prefix("p1", "s1/", Some(ArtifactKind::Events))
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert!(store.contains("s1/screenshots/b.bin"));
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::epoch_2026();
        let before = clock.now();
        clock.advance(chrono::Duration::seconds(90));
        assert_eq!((clock.now() - before).num_seconds(), 90);
    }
}
