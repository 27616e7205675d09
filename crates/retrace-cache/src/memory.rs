// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process cache adapter.
//!
//! Expiry is lazy: entries past their deadline are treated as absent and
//! removed on the next touch. `set_nx_ttl` relies on dashmap's per-shard
//! locking via the `entry` API for its atomicity.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use retrace_core::RetraceError;
use retrace_core::traits::CacheAdapter;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Single-node [`CacheAdapter`] backed by a concurrent hash map.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn deadline(ttl: Duration) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero())
    }
}

#[async_trait]
impl CacheAdapter for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, RetraceError> {
        let now = Utc::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Drop the expired entry so the map does not grow unbounded.
        self.entries.remove_if(key, |_, e| e.expired(now));
        Ok(None)
    }

    async fn set_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RetraceError> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Self::deadline(ttl),
            },
        );
        Ok(())
    }

    async fn set_nx_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, RetraceError> {
        let now = Utc::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expired(now) {
                    occupied.insert(CacheEntry {
                        value: value.to_string(),
                        expires_at: Self::deadline(ttl),
                    });
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry {
                    value: value.to_string(),
                    expires_at: Self::deadline(ttl),
                });
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), RetraceError> {
        self.entries.remove(key);
        Ok(())
    }
}
