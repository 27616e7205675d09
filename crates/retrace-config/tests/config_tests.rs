// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the configuration system.

use retrace_config::{ConfigError, load_and_validate_str};

#[test]
fn full_config_parses() {
    let toml = r#"
[service]
name = "retrace-ingest-1"
log_level = "debug"

[worker]
concurrency = 8
poll_interval_secs = 2
batch_size = 50
max_attempts = 5

[finalizer]
sweep_interval_secs = 15
staleness_secs = 90
guard_secs = 45

[storage]
database_path = "/var/lib/retrace/retrace.db"
wal_mode = true

[object_store]
endpoint_url = "https://s3.eu-central-1.amazonaws.com"
bucket = "retrace-artifacts"
region = "eu-central-1"
access_key_id = "AKIAEXAMPLE"
secret_access_key = "hunter2"
single_tenant = true

[cache]
entry_ttl_secs = 120
lock_ttl_secs = 5
lock_retry_ms = 100
lock_max_retries = 10
"#;

    let config = load_and_validate_str(toml).expect("full config should validate");
    assert_eq!(config.service.name, "retrace-ingest-1");
    assert_eq!(config.worker.concurrency, 8);
    assert_eq!(config.worker.max_attempts, 5);
    assert_eq!(config.finalizer.staleness_secs, 90);
    assert_eq!(config.object_store.region, "eu-central-1");
    assert!(config.object_store.single_tenant);
    assert_eq!(config.cache.lock_max_retries, 10);
}

#[test]
fn typo_produces_suggestion() {
    let errors = load_and_validate_str("[worker]\nconcurency = 4\n")
        .expect_err("typo should be rejected");
    let found = errors.iter().any(|e| match e {
        ConfigError::UnknownKey { suggestion, .. } => {
            suggestion.as_deref() == Some("concurrency")
        }
        _ => false,
    });
    assert!(found, "expected a `concurrency` suggestion, got {errors:?}");
}

#[test]
fn semantic_validation_runs_after_parse() {
    let errors = load_and_validate_str("[worker]\nconcurrency = 0\n")
        .expect_err("zero concurrency should fail validation");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn single_tenant_without_credentials_fails() {
    let errors = load_and_validate_str("[object_store]\nsingle_tenant = true\n")
        .expect_err("incomplete single-tenant section should fail");
    assert!(errors.len() >= 2);
}
