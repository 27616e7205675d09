// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-kind metric extractors for Retrace artifacts.
//!
//! Extraction is pure: bytes in, a summary out. The worker owns all
//! persistence so a retried job re-runs the extractor against a fresh
//! download without partial state.

pub mod crashes;
pub mod events;
pub mod heatmap;
pub mod media;
pub mod payload;

use retrace_core::RetraceError;
use retrace_core::types::ArtifactKind;
use retrace_storage::CrashReport;

pub use crashes::ReportKind;
pub use events::EventsSummary;
pub use media::{HierarchySummary, ScreenshotSummary};

/// Output of dispatching one artifact body to its kind's extractor.
#[derive(Debug)]
pub enum Extraction {
    Events(EventsSummary),
    Crashes(Vec<CrashReport>),
    Anrs(Vec<CrashReport>),
    Screenshots(ScreenshotSummary),
    Hierarchy(HierarchySummary),
}

/// Dispatch purely by artifact kind.
pub fn extract(
    kind: ArtifactKind,
    project_id: &str,
    session_id: &str,
    body: &[u8],
) -> Result<Extraction, RetraceError> {
    match kind {
        ArtifactKind::Events => {
            let payload = payload::parse_events(body)?;
            Ok(Extraction::Events(events::summarize(&payload)))
        }
        ArtifactKind::Crashes => Ok(Extraction::Crashes(extract_reports(
            ReportKind::Crash,
            project_id,
            session_id,
            body,
        )?)),
        ArtifactKind::Anrs => Ok(Extraction::Anrs(extract_reports(
            ReportKind::Anr,
            project_id,
            session_id,
            body,
        )?)),
        ArtifactKind::Screenshots => {
            Ok(Extraction::Screenshots(media::summarize_screenshots(body)?))
        }
        ArtifactKind::Hierarchy => Ok(Extraction::Hierarchy(media::summarize_hierarchy(body))),
    }
}

fn extract_reports(
    kind: ReportKind,
    project_id: &str,
    session_id: &str,
    body: &[u8],
) -> Result<Vec<CrashReport>, RetraceError> {
    let raw = payload::parse_crashes(body)?;
    Ok(raw
        .iter()
        .map(|record| crashes::to_report(kind, project_id, session_id, record))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_covers_every_kind() {
        let events = br#"{"events":[{"type":"touch","timestamp":1,"x":1.0,"y":1.0}]}"#;
        assert!(matches!(
            extract(ArtifactKind::Events, "p1", "s1", events).unwrap(),
            Extraction::Events(_)
        ));

        let crash = br#"{"exceptionName":"E","message":"m"}"#;
        let Extraction::Crashes(reports) =
            extract(ArtifactKind::Crashes, "p1", "s1", crash).unwrap()
        else {
            panic!("expected crashes");
        };
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, "crash");

        let Extraction::Anrs(reports) = extract(ArtifactKind::Anrs, "p1", "s1", crash).unwrap()
        else {
            panic!("expected anrs");
        };
        assert_eq!(reports[0].kind, "anr");

        assert!(matches!(
            extract(ArtifactKind::Screenshots, "p1", "s1", b"\x00\x01").unwrap(),
            Extraction::Screenshots(_)
        ));
        assert!(matches!(
            extract(ArtifactKind::Hierarchy, "p1", "s1", b"{}").unwrap(),
            Extraction::Hierarchy(_)
        ));
    }

    #[test]
    fn malformed_events_payload_is_transient() {
        let err = extract(ArtifactKind::Events, "p1", "s1", b"nope").unwrap_err();
        assert!(err.is_transient());
    }
}
