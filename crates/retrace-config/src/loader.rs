// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./retrace.toml` > `~/.config/retrace/retrace.toml`
//! > `/etc/retrace/retrace.toml`, with environment variable overrides via the
//! `RETRACE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::RetraceConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/retrace/retrace.toml` (system-wide)
/// 3. `~/.config/retrace/retrace.toml` (user XDG config)
/// 4. `./retrace.toml` (local directory)
/// 5. `RETRACE_*` environment variables
pub fn load_config() -> Result<RetraceConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<RetraceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RetraceConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RetraceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RetraceConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(RetraceConfig::default()))
        .merge(Toml::file("/etc/retrace/retrace.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("retrace/retrace.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("retrace.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `RETRACE_WORKER_MAX_ATTEMPTS` must map
/// to `worker.max_attempts`, not `worker.max.attempts`.
fn env_provider() -> Env {
    Env::prefixed("RETRACE_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("service_", "service.", 1)
            .replacen("worker_", "worker.", 1)
            .replacen("finalizer_", "finalizer.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("object_store_", "object_store.", 1)
            .replacen("cache_", "cache.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_loading_applies_overrides_over_defaults() {
        let config = load_config_from_str(
            "[worker]\nconcurrency = 16\n\n[finalizer]\nstaleness_secs = 120\n",
        )
        .unwrap();
        assert_eq!(config.worker.concurrency, 16);
        assert_eq!(config.finalizer.staleness_secs, 120);
        // Untouched sections keep their defaults.
        assert_eq!(config.worker.batch_size, 25);
    }

    #[test]
    fn empty_string_yields_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.service.name, "retrace");
    }
}
