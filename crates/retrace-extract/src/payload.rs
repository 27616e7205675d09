// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire models for uploaded artifact payloads.
//!
//! Payloads come from capture SDKs in the field, so parsing is lenient:
//! unknown fields are ignored, unknown event types are skipped by the
//! extractors, and crash payloads accept three historical shapes (single
//! object, bare array, wrapped array).

use retrace_core::RetraceError;
use serde::Deserialize;

/// An events artifact: `{"events": [...]}`.
#[derive(Debug, Deserialize)]
pub struct EventsPayload {
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

/// One captured event. Only `type` is required; everything else depends
/// on the event class.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub gesture_type: Option<String>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub screen_width: Option<f64>,
    #[serde(default)]
    pub screen_height: Option<f64>,
    #[serde(default)]
    pub screen_name: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub status_code: Option<i64>,
    #[serde(default)]
    pub duration_ms: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One crash or ANR record as uploaded.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawCrash {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub exception_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stack_trace: Option<String>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WrappedCrashes {
    #[serde(default)]
    crashes: Vec<RawCrash>,
    #[serde(default)]
    anrs: Vec<RawCrash>,
}

/// A screenshot artifact manifest: segment accounting plus the capture
/// window, used by the recovery path.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotManifest {
    #[serde(default)]
    pub segment_count: i64,
    #[serde(default)]
    pub byte_count: i64,
    /// Epoch milliseconds of the last captured frame.
    #[serde(default)]
    pub recorded_end: Option<f64>,
}

pub fn parse_events(body: &[u8]) -> Result<EventsPayload, RetraceError> {
    serde_json::from_slice(body).map_err(|e| RetraceError::Payload(format!("events: {e}")))
}

/// Parse crash/ANR payloads in any of their accepted shapes.
pub fn parse_crashes(body: &[u8]) -> Result<Vec<RawCrash>, RetraceError> {
    if let Ok(wrapped) = serde_json::from_slice::<WrappedCrashes>(body) {
        if !wrapped.crashes.is_empty() || !wrapped.anrs.is_empty() {
            let mut records = wrapped.crashes;
            records.extend(wrapped.anrs);
            return Ok(records);
        }
    }
    if let Ok(list) = serde_json::from_slice::<Vec<RawCrash>>(body) {
        return Ok(list);
    }
    serde_json::from_slice::<RawCrash>(body)
        .map(|record| vec![record])
        .map_err(|e| RetraceError::Payload(format!("crashes: {e}")))
}

pub fn parse_screenshot_manifest(body: &[u8]) -> Result<ScreenshotManifest, RetraceError> {
    serde_json::from_slice(body).map_err(|e| RetraceError::Payload(format!("screenshots: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_parsing_ignores_unknown_fields() {
        let body = br#"{"events":[
            {"type":"touch","x":10.0,"y":20.0,"timestamp":1000,"futureField":true},
            {"type":"mystery"}
        ],"sdkVersion":"3.2.0"}"#;
        let payload = parse_events(body).unwrap();
        assert_eq!(payload.events.len(), 2);
        assert_eq!(payload.events[0].kind, "touch");
        assert_eq!(payload.events[1].kind, "mystery");
    }

    #[test]
    fn crash_payload_accepts_all_three_shapes() {
        let single = br#"{"exceptionName":"NSRangeException","message":"oops"}"#;
        assert_eq!(parse_crashes(single).unwrap().len(), 1);

        let array = br#"[{"message":"a"},{"message":"b"}]"#;
        assert_eq!(parse_crashes(array).unwrap().len(), 2);

        let wrapped = br#"{"crashes":[{"message":"a"}],"anrs":[{"message":"b"}]}"#;
        assert_eq!(parse_crashes(wrapped).unwrap().len(), 2);
    }

    #[test]
    fn garbage_is_a_payload_error() {
        let err = parse_events(b"{not json").unwrap_err();
        assert!(matches!(err, RetraceError::Payload(_)));
        assert!(err.is_transient());

        assert!(parse_crashes(b"\xff\xfe").is_err());
    }
}
