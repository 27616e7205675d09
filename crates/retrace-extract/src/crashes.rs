// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crash and ANR extraction: fingerprinting and record shaping.

use chrono::{DateTime, Utc};
use retrace_core::time::fmt_ts;
use retrace_storage::CrashReport;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::payload::RawCrash;

/// Which flavour of report an artifact carries. Determines the stored
/// `kind` and the fingerprint recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Crash,
    Anr,
}

impl ReportKind {
    fn as_str(self) -> &'static str {
        match self {
            ReportKind::Crash => "crash",
            ReportKind::Anr => "anr",
        }
    }
}

/// Grouping fingerprint.
///
/// Crashes group by `sha256(projectId:exceptionName:message)`; ANRs have
/// no exception name and use the literal `anr` in its place, so the same
/// stall message groups across sessions.
pub fn fingerprint(kind: ReportKind, project_id: &str, exception_name: &str, message: &str) -> String {
    let input = match kind {
        ReportKind::Crash => format!("{project_id}:{exception_name}:{message}"),
        ReportKind::Anr => format!("{project_id}:anr:{message}"),
    };
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Shape one uploaded record into a storable [`CrashReport`].
///
/// `fallback_session` is the session the artifact belongs to; a record
/// carrying its own `sessionId` (crash-before-session-upload) wins.
pub fn to_report(
    kind: ReportKind,
    project_id: &str,
    fallback_session: &str,
    raw: &RawCrash,
) -> CrashReport {
    let exception_name = raw
        .exception_name
        .clone()
        .unwrap_or_else(|| match kind {
            ReportKind::Crash => "UnknownException".to_string(),
            ReportKind::Anr => "ANR".to_string(),
        });
    let message = raw.message.clone().unwrap_or_default();
    let occurred_at = raw
        .timestamp
        .and_then(ms_to_ts)
        .unwrap_or_else(|| fmt_ts(Utc::now()));

    CrashReport {
        id: Uuid::new_v4().to_string(),
        project_id: project_id.to_string(),
        session_id: raw
            .session_id
            .clone()
            .unwrap_or_else(|| fallback_session.to_string()),
        kind: kind.as_str().to_string(),
        fingerprint: fingerprint(kind, project_id, &exception_name, &message),
        exception_name,
        message,
        stack_trace: raw.stack_trace.clone(),
        occurred_at,
    }
}

fn ms_to_ts(ms: f64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms as i64).map(fmt_ts)
}
