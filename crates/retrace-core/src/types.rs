// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common domain types shared across the Retrace workspace.
//!
//! Status fields and artifact kinds are closed enums (not strings) so that
//! adding a kind is a compile-time-checked change in every dispatcher.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The kind of an uploaded artifact. Dispatch to extractors is an
/// exhaustive match on this enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Events,
    Crashes,
    Anrs,
    Screenshots,
    Hierarchy,
}

/// Lifecycle status of a job.
///
/// `Failed` is a retry-pending state; the terminal states are `Done` and
/// `Dlq`. A job reaches at most one terminal state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
    Dlq,
}

impl JobStatus {
    /// Whether the status is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Dlq)
    }
}

/// Lifecycle status of an artifact blob.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Pending,
    Ready,
}

/// Lifecycle status of a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Processing,
    Ready,
    Failed,
    Deleted,
}

/// Result of a promotion evaluation for a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionDecision {
    pub promoted: bool,
    pub reason: String,
}

/// Device-usage accounting delta recorded when a session closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageDelta {
    pub request_count: u64,
    pub minutes_recorded: f64,
}

/// A crash, error, or ANR record forwarded to the issue tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRecord {
    pub project_id: String,
    pub session_id: String,
    /// "crash" or "anr".
    pub kind: String,
    pub fingerprint: String,
    pub title: String,
    pub message: String,
}
