// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Retrace ingest worker: a polling job queue consumer, the
//! auto-finalizer sweep, and the fire-and-forget completion triggers.
//!
//! The poll loop and the finalizer run as independent periodic tasks over
//! shared storage; the job status column is their only synchronization
//! point.

pub mod context;
pub mod finalizer;
pub mod poller;
pub mod runner;
pub mod shutdown;
pub mod triggers;

pub use context::WorkerContext;
pub use runner::JobOutcome;
