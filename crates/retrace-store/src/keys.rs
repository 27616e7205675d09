// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Object key layout.
//!
//! Every artifact lives under
//! `tenant/{team_id}/project/{project_id}/sessions/{session_id}/{kind}/{filename}`.
//! The kind segment and the filename extension together form the purge
//! guard: a delete scoped to one artifact kind refuses keys whose path
//! does not carry that segment or whose extension the kind never writes.

use retrace_core::types::ArtifactKind;

/// Build the canonical object key for an artifact file.
pub fn artifact_key(
    team_id: &str,
    project_id: &str,
    session_id: &str,
    kind: ArtifactKind,
    filename: &str,
) -> String {
    format!("tenant/{team_id}/project/{project_id}/sessions/{session_id}/{kind}/{filename}")
}

/// Prefix covering every object of one session.
pub fn session_prefix(team_id: &str, project_id: &str, session_id: &str) -> String {
    format!("tenant/{team_id}/project/{project_id}/sessions/{session_id}/")
}

/// Whether `key` belongs to the given artifact kind per the path layout
/// and the extensions that kind writes. Screenshot uploads are binary
/// segments plus a JSON manifest; everything else is JSON batches.
pub fn matches_kind(key: &str, kind: ArtifactKind) -> bool {
    let segment = format!("/{kind}/");
    if !key.contains(&segment) {
        return false;
    }
    let extensions: &[&str] = match kind {
        ArtifactKind::Screenshots => &[".bin", ".json"],
        _ => &[".json"],
    };
    extensions.iter().any(|ext| key.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_round_trips_through_guard() {
        let key = artifact_key("t1", "p1", "s1", ArtifactKind::Events, "batch-0001.json");
        assert_eq!(
            key,
            "tenant/t1/project/p1/sessions/s1/events/batch-0001.json"
        );
        assert!(key.starts_with(&session_prefix("t1", "p1", "s1")));
        assert!(matches_kind(&key, ArtifactKind::Events));
        assert!(!matches_kind(&key, ArtifactKind::Screenshots));
    }

    #[test]
    fn guard_rejects_foreign_kinds() {
        let key = artifact_key("t1", "p1", "s1", ArtifactKind::Screenshots, "seg-3.bin");
        assert!(matches_kind(&key, ArtifactKind::Screenshots));
        assert!(!matches_kind(&key, ArtifactKind::Events));
        assert!(!matches_kind(&key, ArtifactKind::Hierarchy));
    }

    #[test]
    fn guard_rejects_foreign_extensions_inside_the_kind_directory() {
        // A stray object under the right directory but with an extension
        // the kind never writes must survive a scoped purge.
        let stray = artifact_key("t1", "p1", "s1", ArtifactKind::Events, "dump.txt");
        assert!(!matches_kind(&stray, ArtifactKind::Events));

        // Binary segments belong to screenshots only; JSON manifests are
        // valid for every kind.
        let segment = artifact_key("t1", "p1", "s1", ArtifactKind::Screenshots, "seg-0.bin");
        let manifest = artifact_key("t1", "p1", "s1", ArtifactKind::Screenshots, "manifest.json");
        assert!(matches_kind(&segment, ArtifactKind::Screenshots));
        assert!(matches_kind(&manifest, ArtifactKind::Screenshots));

        let fake_segment = artifact_key("t1", "p1", "s1", ArtifactKind::Events, "batch.bin");
        assert!(!matches_kind(&fake_segment, ArtifactKind::Events));
    }
}
