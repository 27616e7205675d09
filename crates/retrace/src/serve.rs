// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `retrace serve` command implementation.
//!
//! Opens storage, builds the endpoint resolver and artifact store, wires
//! the worker context with the standalone collaborators (cache-backed
//! frame prewarming, everything else log-only), and runs the poll loop
//! and the auto-finalizer until a shutdown signal arrives. The in-flight
//! batch drains before storage is closed.

use std::sync::Arc;
use std::time::Duration;

use retrace_cache::{LockOptions, MemoryCache};
use retrace_config::{CacheConfig, RetraceConfig};
use retrace_core::RetraceError;
use retrace_core::traits::{CacheAdapter, ObjectStore, SystemClock};
use retrace_storage::Database;
use retrace_store::{ArtifactStore, EndpointResolver, EnvSecretResolver, SecretResolver};
use retrace_worker::{WorkerContext, finalizer, poller, shutdown};
use tracing::{error, info};

use crate::collaborators::{
    FramePrewarmer, LogIssueSink, LogPromotionEvaluator, LogUsageRecorder,
};

/// Runs the `retrace serve` command.
pub async fn run_serve(config: RetraceConfig) -> Result<(), RetraceError> {
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        database = %config.storage.database_path,
        "starting retrace serve"
    );

    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;

    let secrets: Arc<dyn SecretResolver> = Arc::new(EnvSecretResolver);
    let resolver = Arc::new(EndpointResolver::new(db.clone(), secrets));
    let store: Arc<dyn ObjectStore> = if config.object_store.single_tenant {
        info!("object store running in single-tenant mode");
        Arc::new(ArtifactStore::single_tenant(
            Arc::clone(&resolver),
            &config.object_store,
        )?)
    } else {
        Arc::new(ArtifactStore::new(Arc::clone(&resolver)))
    };

    let cache: Arc<dyn CacheAdapter> = Arc::new(MemoryCache::new());
    let hooks = Arc::new(FramePrewarmer::new(
        db.clone(),
        Arc::clone(&cache),
        lock_options(&config.cache),
    ));

    let ctx = Arc::new(WorkerContext {
        db: db.clone(),
        store,
        cache,
        clock: Arc::new(SystemClock),
        promotion: Arc::new(LogPromotionEvaluator),
        issues: Arc::new(LogIssueSink),
        usage: Arc::new(LogUsageRecorder),
        hooks,
        worker: config.worker.clone(),
        finalizer: config.finalizer.clone(),
    });

    let cancel = shutdown::install_signal_handler();
    let poll_loop = tokio::spawn(poller::run(Arc::clone(&ctx), cancel.clone()));
    let sweep_loop = tokio::spawn(finalizer::run(Arc::clone(&ctx), cancel.clone()));

    let (poll_result, sweep_result) = tokio::join!(poll_loop, sweep_loop);
    if let Err(e) = poll_result {
        error!(error = %e, "poll loop task failed");
    }
    if let Err(e) = sweep_result {
        error!(error = %e, "finalizer task failed");
    }

    db.close().await?;
    info!("retrace serve stopped");
    Ok(())
}

/// Translate the `[cache]` configuration section into stampede-lock
/// tunables.
fn lock_options(cache: &CacheConfig) -> LockOptions {
    LockOptions {
        value_ttl: Duration::from_secs(cache.entry_ttl_secs),
        lock_ttl: Duration::from_secs(cache.lock_ttl_secs),
        retry_interval: Duration::from_millis(cache.lock_retry_ms),
        max_retries: cache.lock_max_retries,
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("retrace={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_config_maps_onto_lock_options() {
        let section = CacheConfig {
            entry_ttl_secs: 300,
            lock_ttl_secs: 5,
            lock_retry_ms: 25,
            lock_max_retries: 8,
        };
        let options = lock_options(&section);
        assert_eq!(options.value_ttl, Duration::from_secs(300));
        assert_eq!(options.lock_ttl, Duration::from_secs(5));
        assert_eq!(options.retry_interval, Duration::from_millis(25));
        assert_eq!(options.max_retries, 8);
    }
}
