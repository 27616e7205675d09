// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Retrace ingest pipeline.
//!
//! A single async connection (tokio-rusqlite) serializes all writes, which
//! is what makes the arithmetic-increment update pattern in the query
//! modules race-free. Schema lives in embedded refinery migrations and is
//! applied on open.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

#[cfg(test)]
pub(crate) mod test_support;

pub use database::Database;
pub use models::{Artifact, CrashReport, Job, Session, SessionMetrics, StorageEndpoint};
pub use queries::heatmaps::HeatmapDelta;
pub use queries::metrics::MetricsDelta;
