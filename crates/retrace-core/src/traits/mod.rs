// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions for the ingest pipeline.
//!
//! The worker and finalizer depend on these seams rather than concrete
//! implementations, so tests can substitute mocks and the out-of-scope
//! collaborators (promotion evaluator, issue tracker, usage accounting)
//! stay external.

pub mod cache;
pub mod clock;
pub mod collaborators;
pub mod object_store;

pub use cache::CacheAdapter;
pub use clock::{Clock, SystemClock};
pub use collaborators::{IssueSink, PromotionEvaluator, SessionHooks, UsageRecorder};
pub use object_store::{ObjectStore, UploadReceipt};
