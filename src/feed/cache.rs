//! Caching implementations for feed types.

use sha2::{Digest, Sha256};
use url::Url;

use crate::cache::Cacheable;
use crate::error::{CacheError, TransportError};

use super::client::Endpoint;
use super::types::{FeedImage, ImageData};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Vec<FeedImage> {
  fn entity_type() -> &'static str {
    "feed"
  }

  fn to_cache_bytes(&self) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec(self).map_err(|e| CacheError::Storage(format!("Failed to serialize feed: {}", e)))
  }

  fn from_cache_bytes(bytes: &[u8]) -> Result<Self, CacheError> {
    serde_json::from_slice(bytes)
      .map_err(|e| CacheError::Storage(format!("Failed to deserialize feed: {}", e)))
  }
}

impl Cacheable for ImageData {
  fn entity_type() -> &'static str {
    "image_data"
  }

  fn to_cache_bytes(&self) -> Result<Vec<u8>, CacheError> {
    Ok(self.0.clone())
  }

  fn from_cache_bytes(bytes: &[u8]) -> Result<Self, CacheError> {
    Ok(ImageData(bytes.to_vec()))
  }
}

// ============================================================================
// Resource requests
// ============================================================================

/// What a pipeline is asked to load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceRequest {
  /// The whole feed
  Feed,
  /// The image bytes behind a feed image URL
  ImageData { url: Url },
}

impl ResourceRequest {
  /// Stable, fixed-length key for the cache store.
  pub fn cache_key(&self) -> String {
    // Url parsing already normalizes scheme and host case
    let input = match self {
      Self::Feed => "feed".to_string(),
      Self::ImageData { url } => format!("image_data:{}", url),
    };

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  pub fn description(&self) -> String {
    match self {
      Self::Feed => "feed".to_string(),
      Self::ImageData { url } => format!("image data {}", url),
    }
  }

  /// Where the remote copy lives.
  pub fn url(&self, base: &Url) -> Result<Url, TransportError> {
    match self {
      Self::Feed => Endpoint::Feed.url(base),
      Self::ImageData { url } => Ok(url.clone()),
    }
  }
}
