//! Local cache storage for offline access.
//!
//! This module provides a resource-agnostic store that:
//! - Keeps one entry per (entity type, key) with the time it was written
//! - Treats entries older than the configured max age as misses
//! - Prunes expired or unreadable entries on `invalidate`

mod storage;
mod traits;

pub use storage::{CacheStore, NoopStore, SqliteStore};
pub use traits::{CacheEntry, Cacheable};
