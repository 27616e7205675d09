// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Retrace ingest pipeline.
//!
//! This crate provides the foundational error type, closed domain enums,
//! and collaborator traits used throughout the Retrace workspace.

pub mod error;
pub mod time;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::RetraceError;
pub use types::{
    ArtifactKind, ArtifactStatus, IssueRecord, JobStatus, PromotionDecision, SessionStatus,
    UsageDelta,
};

// Re-export collaborator traits at crate root.
pub use traits::{
    CacheAdapter, Clock, IssueSink, ObjectStore, PromotionEvaluator, SessionHooks, SystemClock,
    UsageRecorder,
};
