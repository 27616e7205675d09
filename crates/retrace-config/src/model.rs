// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Retrace ingest pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, producing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Retrace configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values; the single-tenant object-store fallback is the one section that
/// usually needs explicit configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetraceConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Ingest worker settings (poll loop, concurrency, retry budget).
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Auto-finalizer sweep settings.
    #[serde(default)]
    pub finalizer: FinalizerConfig,

    /// SQLite persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Single-tenant fallback object-store endpoint.
    #[serde(default)]
    pub object_store: ObjectStoreConfig,

    /// Shared cache and stampede-lock settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service instance.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "retrace".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Ingest worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Number of jobs processed concurrently within one polling batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Seconds between polling passes over the job queue.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum jobs selected per polling pass (before session dedup).
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Processing attempts before a job is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_secs: default_poll_interval_secs(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_batch_size() -> u32 {
    25
}

fn default_max_attempts() -> i64 {
    3
}

/// Auto-finalizer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FinalizerConfig {
    /// Seconds between finalizer sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// A session is finalizable once its newest artifact is older than this.
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: i64,

    /// Sessions younger than this are never finalized, to avoid racing a
    /// producer that is still uploading its first chunks.
    #[serde(default = "default_guard_secs")]
    pub guard_secs: i64,
}

impl Default for FinalizerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            staleness_secs: default_staleness_secs(),
            guard_secs: default_guard_secs(),
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_staleness_secs() -> i64 {
    60
}

fn default_guard_secs() -> i64 {
    30
}

/// SQLite persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("retrace").join("retrace.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("retrace.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Single-tenant fallback object-store endpoint.
///
/// When no `storage_endpoints` rows exist for a project (and no global
/// rows either), a virtual endpoint is synthesized from this section.
/// Credentials left unset make endpoint resolution a fail-fast error.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectStoreConfig {
    /// S3-compatible endpoint URL, e.g. `https://s3.us-east-1.amazonaws.com`.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Externally reachable endpoint URL used only for presigned URLs.
    /// Falls back to `endpoint_url` when unset.
    #[serde(default)]
    pub public_endpoint_url: Option<String>,

    /// Bucket name for the virtual endpoint.
    #[serde(default)]
    pub bucket: Option<String>,

    /// Region for SigV4 signing.
    #[serde(default = "default_region")]
    pub region: String,

    /// Access key id for the virtual endpoint.
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Secret access key for the virtual endpoint.
    #[serde(default)]
    pub secret_access_key: Option<String>,

    /// Enable the virtual-endpoint fallback. Multi-tenant deployments keep
    /// this off and configure endpoints through the registry table.
    #[serde(default)]
    pub single_tenant: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Shared cache and stampede-lock configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// TTL for populated cache entries.
    #[serde(default = "default_entry_ttl_secs")]
    pub entry_ttl_secs: u64,

    /// TTL for the refresh lock key.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// Delay between lock acquisition attempts.
    #[serde(default = "default_lock_retry_ms")]
    pub lock_retry_ms: u64,

    /// Attempts before falling through to an uncached fetch.
    #[serde(default = "default_lock_max_retries")]
    pub lock_max_retries: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl_secs: default_entry_ttl_secs(),
            lock_ttl_secs: default_lock_ttl_secs(),
            lock_retry_ms: default_lock_retry_ms(),
            lock_max_retries: default_lock_max_retries(),
        }
    }
}

fn default_entry_ttl_secs() -> u64 {
    60
}

fn default_lock_ttl_secs() -> u64 {
    10
}

fn default_lock_retry_ms() -> u64 {
    150
}

fn default_lock_max_retries() -> u32 {
    20
}
