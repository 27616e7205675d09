// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anti-stampede compute lock.
//!
//! When many workers need the same expensive value at once, exactly one
//! should compute it while the rest wait for the cached result. The lock
//! is a `set_nx_ttl` sentinel next to the value key; waiters poll the
//! value with a bounded retry budget and, if the budget runs out (holder
//! crashed, or the computation outlived the lock TTL), fall through and
//! compute for themselves without touching the cache.

use std::future::Future;
use std::time::Duration;

use retrace_core::RetraceError;
use retrace_core::traits::CacheAdapter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

/// Tunables for [`CacheLock`]. Defaults match the service configuration
/// defaults: 60s value TTL, 10s lock TTL, 20 retries at 150ms.
#[derive(Debug, Clone)]
pub struct LockOptions {
    pub value_ttl: Duration,
    pub lock_ttl: Duration,
    pub retry_interval: Duration,
    pub max_retries: u32,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            value_ttl: Duration::from_secs(60),
            lock_ttl: Duration::from_secs(10),
            retry_interval: Duration::from_millis(150),
            max_retries: 20,
        }
    }
}

/// A compute-through cache guarded against stampedes.
pub struct CacheLock<C> {
    cache: C,
    options: LockOptions,
}

impl<C: CacheAdapter> CacheLock<C> {
    pub fn new(cache: C, options: LockOptions) -> Self {
        Self { cache, options }
    }

    /// Return the cached value for `key`, computing it under the lock on a
    /// miss.
    ///
    /// Exactly one caller computes per expiry window in the normal case.
    /// If the retry budget is exhausted while waiting, the waiter computes
    /// the value itself and returns it WITHOUT caching, so a stale lock
    /// cannot wedge readers.
    pub async fn with_refresh<T, F, Fut>(&self, key: &str, compute: F) -> Result<T, RetraceError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RetraceError>>,
    {
        if let Some(value) = self.read(key).await? {
            return Ok(value);
        }

        let lock_key = format!("{key}:lock");
        let token = Uuid::new_v4().to_string();

        if self
            .cache
            .set_nx_ttl(&lock_key, &token, self.options.lock_ttl)
            .await?
        {
            // Someone may have filled the value between our miss and the
            // lock grab.
            if let Some(value) = self.read(key).await? {
                self.release(&lock_key, &token).await;
                return Ok(value);
            }

            let result = compute().await;
            if let Ok(value) = &result {
                let encoded = serde_json::to_string(value)
                    .map_err(|e| RetraceError::Internal(format!("cache encode: {e}")))?;
                self.cache
                    .set_ttl(key, &encoded, self.options.value_ttl)
                    .await?;
            }
            self.release(&lock_key, &token).await;
            return result;
        }

        for _ in 0..self.options.max_retries {
            tokio::time::sleep(self.options.retry_interval).await;
            if let Some(value) = self.read(key).await? {
                return Ok(value);
            }
        }

        warn!(key, "cache lock wait exhausted, computing without caching");
        compute().await
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RetraceError> {
        match self.cache.get(key).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    // A corrupt entry is treated as a miss and dropped.
                    debug!(key, error = %e, "discarding undecodable cache entry");
                    self.cache.delete(key).await?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Delete the lock sentinel, but only if we still hold it. A lock that
    /// expired and was re-acquired by another worker must not be deleted
    /// out from under them.
    async fn release(&self, lock_key: &str, token: &str) {
        match self.cache.get(lock_key).await {
            Ok(Some(held)) if held == token => {
                if let Err(e) = self.cache.delete(lock_key).await {
                    debug!(lock_key, error = %e, "failed to release cache lock");
                }
            }
            Ok(_) => {}
            Err(e) => debug!(lock_key, error = %e, "failed to inspect cache lock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::memory::MemoryCache;

    fn fast_options() -> LockOptions {
        LockOptions {
            value_ttl: Duration::from_secs(60),
            lock_ttl: Duration::from_secs(10),
            retry_interval: Duration::from_millis(5),
            max_retries: 20,
        }
    }

    #[tokio::test]
    async fn computes_once_then_serves_from_cache() {
        let lock = CacheLock::new(MemoryCache::new(), fast_options());
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: i64 = lock
                .with_refresh("answer", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_misses_compute_exactly_once() {
        let lock = Arc::new(CacheLock::new(MemoryCache::new(), fast_options()));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = Arc::clone(&lock);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                lock.with_refresh("shared", || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, RetraceError>("expensive".to_string())
                    }
                })
                .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "expensive");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_waiter_computes_without_caching() {
        let cache = MemoryCache::new();
        // Simulate a crashed holder: lock sentinel present, no value.
        cache
            .set_nx_ttl("slow:lock", "dead-holder", Duration::from_secs(600))
            .await
            .unwrap();

        let lock = CacheLock::new(
            cache,
            LockOptions {
                retry_interval: Duration::from_millis(1),
                max_retries: 3,
                ..fast_options()
            },
        );

        let value: i64 = lock.with_refresh("slow", || async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);

        // The fallthrough must not have populated the cache.
        assert_eq!(lock.cache.get("slow").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_entries_are_discarded_and_recomputed() {
        let cache = MemoryCache::new();
        cache
            .set_ttl("bad", "{not json", Duration::from_secs(60))
            .await
            .unwrap();

        let lock = CacheLock::new(cache, fast_options());
        let value: i64 = lock.with_refresh("bad", || async { Ok(9) }).await.unwrap();
        assert_eq!(value, 9);
    }
}
