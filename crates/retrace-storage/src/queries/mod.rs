// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per storage entity.

pub mod artifacts;
pub mod crashes;
pub mod endpoints;
pub mod heatmaps;
pub mod jobs;
pub mod metrics;
pub mod sessions;
pub mod stats;
