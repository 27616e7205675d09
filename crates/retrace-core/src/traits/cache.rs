// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache adapter trait for shared TTL caches.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RetraceError;

/// A shared key/value cache with per-entry TTLs.
///
/// `set_nx_ttl` must be atomic: it is the primitive the distributed cache
/// lock is built on. Implementations may be in-process (single-node) or
/// backed by a shared store; the lock algorithm does not care.
#[async_trait]
pub trait CacheAdapter: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RetraceError>;

    async fn set_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RetraceError>;

    /// Set `key` only if it is absent (or expired). Returns `true` if the
    /// value was set by this call.
    async fn set_nx_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, RetraceError>;

    async fn delete(&self, key: &str) -> Result<(), RetraceError>;
}

// Shared handles to a cache are themselves a cache, so generic consumers
// like the stampede lock can be built over `Arc<dyn CacheAdapter>`.
#[async_trait]
impl<T: CacheAdapter + ?Sized> CacheAdapter for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>, RetraceError> {
        (**self).get(key).await
    }

    async fn set_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RetraceError> {
        (**self).set_ttl(key, value, ttl).await
    }

    async fn set_nx_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, RetraceError> {
        (**self).set_nx_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), RetraceError> {
        (**self).delete(key).await
    }
}
