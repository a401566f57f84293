//! Error taxonomy for resource loading.
//!
//! Transport and decoding failures come from the remote path, cache errors
//! from the local store. `LoadError` is what callers of a pipeline see.

use thiserror::Error;

/// Failure of the remote source to produce a response at all.
#[derive(Error, Debug)]
pub enum TransportError {
  #[error("Network error: {0}")]
  Network(#[from] reqwest::Error),

  #[error("Request failed: {0}")]
  Other(String),
}

/// A response arrived but could not be turned into a domain value.
#[derive(Error, Debug)]
pub enum DecodingError {
  #[error("Unexpected status {0}")]
  UnexpectedStatus(u16),

  #[error("Empty response body")]
  EmptyBody,

  #[error("Invalid payload: {0}")]
  InvalidPayload(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum CacheError {
  /// No usable entry for the key (absent or expired).
  #[error("No cached value for {key}")]
  Miss { key: String },

  #[error("Failed to write cache entry {key}: {reason}")]
  Write { key: String, reason: String },

  #[error("Failed to read cache entry {key}: {reason}")]
  Read { key: String, reason: String },

  #[error("Cache storage error: {0}")]
  Storage(String),
}

impl CacheError {
  pub fn miss(key: impl Into<String>) -> Self {
    CacheError::Miss { key: key.into() }
  }

  pub fn is_miss(&self) -> bool {
    matches!(self, CacheError::Miss { .. })
  }
}

/// Terminal failure of a load: no usable value from any source.
#[derive(Error, Debug)]
pub enum LoadError {
  #[error(transparent)]
  Transport(#[from] TransportError),

  #[error(transparent)]
  Decoding(#[from] DecodingError),

  #[error(transparent)]
  Cache(#[from] CacheError),
}

/// Outcome of a single pipeline invocation.
pub type FetchOutcome<T> = Result<T, LoadError>;
