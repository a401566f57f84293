//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};

use crate::error::CacheError;

/// Trait for values that can be written to and read back from a cache store.
///
/// Implementors choose their own byte encoding: structured values usually go
/// through JSON, binary blobs are stored as-is.
pub trait Cacheable: Send + Sync + Sized + 'static {
  /// Entity type name for storage organization (e.g., "feed", "image_data")
  fn entity_type() -> &'static str;

  /// Encode the value for storage.
  fn to_cache_bytes(&self) -> Result<Vec<u8>, CacheError>;

  /// Decode a value previously produced by `to_cache_bytes`.
  fn from_cache_bytes(bytes: &[u8]) -> Result<Self, CacheError>;
}

/// A value held by a cache store, with the time it was written.
///
/// Loaders never look at `written_at`; expiry is the store's business.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
  pub key: String,
  pub value: T,
  pub written_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
  pub fn new(key: impl Into<String>, value: T, written_at: DateTime<Utc>) -> Self {
    Self {
      key: key.into(),
      value,
      written_at,
    }
  }

  pub fn into_value(self) -> T {
    self.value
  }
}
