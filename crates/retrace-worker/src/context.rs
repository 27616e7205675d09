// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared dependencies for the worker and finalizer loops.

use std::sync::Arc;

use retrace_config::{FinalizerConfig, WorkerConfig};
use retrace_core::traits::{
    CacheAdapter, Clock, IssueSink, ObjectStore, PromotionEvaluator, SessionHooks, UsageRecorder,
};
use retrace_storage::Database;

/// Everything a processing pass needs. Cheap to clone behind the `Arc`s;
/// constructed once at service start and shared by the poller and the
/// auto-finalizer.
pub struct WorkerContext {
    pub db: Database,
    pub store: Arc<dyn ObjectStore>,
    pub cache: Arc<dyn CacheAdapter>,
    pub clock: Arc<dyn Clock>,
    pub promotion: Arc<dyn PromotionEvaluator>,
    pub issues: Arc<dyn IssueSink>,
    pub usage: Arc<dyn UsageRecorder>,
    pub hooks: Arc<dyn SessionHooks>,
    pub worker: WorkerConfig,
    pub finalizer: FinalizerConfig,
}
