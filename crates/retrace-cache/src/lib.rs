// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caching for Retrace: an in-process [`CacheAdapter`] implementation and
//! the anti-stampede [`CacheLock`] built on any adapter.
//!
//! [`CacheAdapter`]: retrace_core::traits::CacheAdapter

pub mod lock;
pub mod memory;

pub use lock::{CacheLock, LockOptions};
pub use memory::MemoryCache;
