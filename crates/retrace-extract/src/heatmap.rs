// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Touch-coordinate bucketing for per-screen heatmaps.
//!
//! Coordinates are normalized by the reporting device's screen size and
//! snapped onto a 50-column by 100-row grid, so the same relative position
//! maps to the same bucket on every device regardless of resolution.

const GRID_COLS: f64 = 50.0;
const GRID_ROWS: f64 = 100.0;

/// Bucket key for a touch at `(x, y)` on a `width`x`height` screen.
///
/// Returns `None` for degenerate dimensions or coordinates outside the
/// screen, which real payloads do produce (touches during rotation).
pub fn bucket_key(x: f64, y: f64, width: f64, height: f64) -> Option<String> {
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    let nx = x / width;
    let ny = y / height;
    if !(0.0..=1.0).contains(&nx) || !(0.0..=1.0).contains(&ny) {
        return None;
    }
    let col = (nx * GRID_COLS).floor().min(GRID_COLS - 1.0) / GRID_COLS;
    let row = (ny * GRID_ROWS).floor().min(GRID_ROWS - 1.0) / GRID_ROWS;
    Some(format!("{col:.2},{row:.2}"))
}
