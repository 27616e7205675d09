// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Screenshot and view-hierarchy recovery.
//!
//! These artifacts are normally consumed by the replay renderer, not this
//! pipeline; the extractor only runs for orphans found by the
//! auto-finalizer. It counts segments and bytes and detects captures that
//! outlive the session's recorded end.

use chrono::{DateTime, Utc};
use retrace_core::RetraceError;
use retrace_core::time::fmt_ts;

use crate::payload::{self, ScreenshotManifest};

/// Recovery outcome for a screenshot artifact.
#[derive(Debug, Clone, Default)]
pub struct ScreenshotSummary {
    pub segment_count: i64,
    pub byte_count: i64,
    /// RFC3339 end of the last captured frame, when the manifest has one.
    pub recorded_end_at: Option<String>,
}

/// Recovery outcome for a hierarchy artifact: byte accounting only.
#[derive(Debug, Clone, Default)]
pub struct HierarchySummary {
    pub byte_count: i64,
}

/// Summarize a screenshot manifest. A missing or non-JSON body falls back
/// to counting the artifact as one raw segment: binary segment uploads
/// predate the manifest format.
pub fn summarize_screenshots(body: &[u8]) -> Result<ScreenshotSummary, RetraceError> {
    match payload::parse_screenshot_manifest(body) {
        Ok(manifest) => Ok(from_manifest(&manifest, body.len() as i64)),
        Err(_) => Ok(ScreenshotSummary {
            segment_count: 1,
            byte_count: body.len() as i64,
            recorded_end_at: None,
        }),
    }
}

fn from_manifest(manifest: &ScreenshotManifest, raw_len: i64) -> ScreenshotSummary {
    ScreenshotSummary {
        segment_count: manifest.segment_count.max(1),
        byte_count: if manifest.byte_count > 0 {
            manifest.byte_count
        } else {
            raw_len
        },
        recorded_end_at: manifest
            .recorded_end
            .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms as i64))
            .map(fmt_ts),
    }
}

pub fn summarize_hierarchy(body: &[u8]) -> HierarchySummary {
    HierarchySummary {
        byte_count: body.len() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_fields_are_used_when_present() {
        let body = br#"{"segmentCount":4,"byteCount":81920,"recordedEnd":1767225660000}"#;
        let summary = summarize_screenshots(body).unwrap();
        assert_eq!(summary.segment_count, 4);
        assert_eq!(summary.byte_count, 81920);
        assert_eq!(summary.recorded_end_at.as_deref(), Some("2026-01-01T00:01:00.000Z"));
    }

    #[test]
    fn raw_binary_counts_as_one_segment() {
        let summary = summarize_screenshots(&[0xffu8; 2048]).unwrap();
        assert_eq!(summary.segment_count, 1);
        assert_eq!(summary.byte_count, 2048);
        assert!(summary.recorded_end_at.is_none());
    }
}
