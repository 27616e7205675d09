// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as positive intervals and complete single-tenant
//! endpoint credentials.

use crate::diagnostic::ConfigError;
use crate::model::RetraceConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &RetraceConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.worker.concurrency == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.concurrency must be at least 1".to_string(),
        });
    }

    if config.worker.batch_size == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.batch_size must be at least 1".to_string(),
        });
    }

    if config.worker.max_attempts < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "worker.max_attempts must be at least 1, got {}",
                config.worker.max_attempts
            ),
        });
    }

    if config.worker.poll_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.poll_interval_secs must be at least 1".to_string(),
        });
    }

    if config.finalizer.sweep_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "finalizer.sweep_interval_secs must be at least 1".to_string(),
        });
    }

    if config.finalizer.staleness_secs < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "finalizer.staleness_secs must be positive, got {}",
                config.finalizer.staleness_secs
            ),
        });
    }

    if config.finalizer.guard_secs < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "finalizer.guard_secs must be non-negative, got {}",
                config.finalizer.guard_secs
            ),
        });
    }

    // Single-tenant mode synthesizes a virtual endpoint from this section,
    // so the section must be complete when the mode is on.
    if config.object_store.single_tenant {
        if config.object_store.endpoint_url.is_none() {
            errors.push(ConfigError::Validation {
                message: "object_store.endpoint_url is required when single_tenant is enabled"
                    .to_string(),
            });
        }
        if config.object_store.bucket.is_none() {
            errors.push(ConfigError::Validation {
                message: "object_store.bucket is required when single_tenant is enabled"
                    .to_string(),
            });
        }
        if config.object_store.access_key_id.is_none()
            || config.object_store.secret_access_key.is_none()
        {
            errors.push(ConfigError::Validation {
                message:
                    "object_store.access_key_id and secret_access_key are required when \
                     single_tenant is enabled"
                        .to_string(),
            });
        }
    }

    if config.cache.lock_ttl_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "cache.lock_ttl_secs must be at least 1".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
