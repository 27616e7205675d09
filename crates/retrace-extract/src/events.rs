// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The events extractor: one pass over a batch of captured events
//! producing a metrics delta, per-screen heatmap deltas, and per-endpoint
//! API rollups.
//!
//! The extractor is pure -- it never touches storage. The worker applies
//! its output through the atomic query-layer updates.

use std::collections::BTreeMap;

use retrace_storage::{HeatmapDelta, MetricsDelta};

use crate::heatmap;
use crate::payload::{EventsPayload, RawEvent};

/// Rage-tap window: a tap is a rage tap when a prior tap within this many
/// milliseconds landed within [`RAGE_TAP_RADIUS_PX`] of it.
const RAGE_TAP_WINDOW_MS: f64 = 500.0;
const RAGE_TAP_RADIUS_PX: f64 = 50.0;

/// Screen used for heatmap attribution before any navigation event.
const UNKNOWN_SCREEN: &str = "(unknown)";

/// Aggregated per-endpoint API stats for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRollup {
    pub endpoint: String,
    pub calls: i64,
    pub errors: i64,
    pub latency_sum_ms: f64,
}

/// Everything the events extractor learned from one batch.
#[derive(Debug, Default)]
pub struct EventsSummary {
    pub metrics: MetricsDelta,
    /// Heatmap deltas keyed by screen name.
    pub heatmaps: BTreeMap<String, HeatmapDelta>,
    pub api_rollups: Vec<ApiRollup>,
    /// Timestamp (epoch ms) of the latest event in the batch.
    pub last_event_at_ms: Option<f64>,
}

struct TapWindow {
    taps: Vec<(f64, f64, f64)>,
}

impl TapWindow {
    fn new() -> Self {
        Self { taps: Vec::new() }
    }

    /// Evict expired taps, then report whether any survivor is close
    /// enough to make this tap a rage tap. The current tap is recorded
    /// either way.
    fn observe(&mut self, t: f64, x: f64, y: f64) -> bool {
        self.taps.retain(|(pt, _, _)| t - pt <= RAGE_TAP_WINDOW_MS);
        let rage = self.taps.iter().any(|(_, px, py)| {
            let dx = x - px;
            let dy = y - py;
            (dx * dx + dy * dy).sqrt() <= RAGE_TAP_RADIUS_PX
        });
        self.taps.push((t, x, y));
        rage
    }
}

/// Run the extractor over a parsed events payload.
pub fn summarize(payload: &EventsPayload) -> EventsSummary {
    let mut summary = EventsSummary::default();
    let mut window = TapWindow::new();
    let mut current_screen = UNKNOWN_SCREEN.to_string();
    let mut api: BTreeMap<String, ApiRollup> = BTreeMap::new();

    for event in &payload.events {
        if let Some(t) = event.timestamp {
            summary.last_event_at_ms = Some(summary.last_event_at_ms.map_or(t, |m: f64| m.max(t)));
        }

        match classify(event) {
            EventClass::Touch => {
                summary.metrics.touch_count += 1;
                let rage = match (event.timestamp, event.x, event.y) {
                    (Some(t), Some(x), Some(y)) => window.observe(t, x, y),
                    _ => false,
                };
                if rage {
                    summary.metrics.rage_tap_count += 1;
                }
                record_bucket(&mut summary.heatmaps, &current_screen, event, rage);
            }
            EventClass::DeadTap => {
                summary.metrics.dead_tap_count += 1;
                record_bucket(&mut summary.heatmaps, &current_screen, event, false);
            }
            EventClass::Scroll => summary.metrics.scroll_count += 1,
            EventClass::Gesture => summary.metrics.gesture_count += 1,
            EventClass::Input => summary.metrics.input_count += 1,
            EventClass::Error => summary.metrics.error_count += 1,
            EventClass::Navigation => {
                if let Some(name) = event.screen_name.as_deref().filter(|n| !n.is_empty()) {
                    current_screen = name.to_string();
                    summary.metrics.screens.push(name.to_string());
                }
            }
            EventClass::ApiCall => {
                summary.metrics.api_call_count += 1;
                let latency = event.duration_ms.unwrap_or(0.0);
                summary.metrics.api_latency_sum_ms += latency;
                let is_error = event.status_code.is_none_or(|code| code >= 400);
                if is_error {
                    summary.metrics.api_error_count += 1;
                }
                let endpoint = event
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| "(unknown)".to_string());
                let rollup = api.entry(endpoint.clone()).or_insert(ApiRollup {
                    endpoint,
                    calls: 0,
                    errors: 0,
                    latency_sum_ms: 0.0,
                });
                rollup.calls += 1;
                if is_error {
                    rollup.errors += 1;
                }
                rollup.latency_sum_ms += latency;
            }
            EventClass::Skip => {}
        }
    }

    summary.api_rollups = api.into_values().collect();
    summary
}

enum EventClass {
    Touch,
    DeadTap,
    Scroll,
    Gesture,
    Input,
    Error,
    Navigation,
    ApiCall,
    Skip,
}

/// Classify by the `(type, gestureType)` pair. Unknown combinations are
/// skipped, never errors: old pipelines must tolerate new SDK event types.
fn classify(event: &RawEvent) -> EventClass {
    let gesture = event.gesture_type.as_deref().unwrap_or("");
    match (event.kind.as_str(), gesture) {
        ("touch", "scroll") | ("scroll", _) => EventClass::Scroll,
        ("touch", "swipe") | ("touch", "pinch") | ("touch", "long_press") => EventClass::Gesture,
        ("touch", "dead_tap") | ("dead_tap", _) => EventClass::DeadTap,
        ("touch", _) | ("tap", _) => EventClass::Touch,
        ("gesture", _) => EventClass::Gesture,
        ("input", _) | ("text_input", _) => EventClass::Input,
        ("error", _) => EventClass::Error,
        ("navigation", _) | ("screen_view", _) => EventClass::Navigation,
        ("api_call", _) | ("network", _) => EventClass::ApiCall,
        _ => EventClass::Skip,
    }
}

fn record_bucket(
    heatmaps: &mut BTreeMap<String, HeatmapDelta>,
    screen: &str,
    event: &RawEvent,
    rage: bool,
) {
    let (Some(x), Some(y), Some(w), Some(h)) =
        (event.x, event.y, event.screen_width, event.screen_height)
    else {
        return;
    };
    let Some(key) = heatmap::bucket_key(x, y, w, h) else {
        return;
    };
    let delta = heatmaps.entry(screen.to_string()).or_default();
    *delta.touch_buckets.entry(key.clone()).or_insert(0) += 1;
    if rage {
        *delta.rage_tap_buckets.entry(key).or_insert(0) += 1;
    }
}
