//! Feed client that loads remotely, writes through to the cache, and falls
//! back to the cache when the remote path fails.

use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheStore, Cacheable};
use crate::error::{DecodingError, FetchOutcome, LoadError};
use crate::pipeline::{caching, fallback, PendingWrites};

use super::api_types::{decode_comments, decode_feed, decode_image_data};
use super::cache::ResourceRequest;
use super::client::{Endpoint, RemoteResponse, RemoteSource};
use super::types::{FeedImage, ImageComment, ImageData, Resource};

type Decoder<T> = fn(RemoteResponse) -> Result<T, DecodingError>;

/// Feed client with transparent caching and offline fallback.
///
/// Built once from its collaborators and shared by every load; it holds no
/// per-call state. Cache writes finish in the background after a load
/// returns; `flush_writes` waits for them.
pub struct CachedFeedClient<R, S> {
  remote: Arc<R>,
  store: Arc<S>,
  base_url: Url,
  writes: PendingWrites,
}

impl<R: RemoteSource, S: CacheStore + 'static> CachedFeedClient<R, S> {
  pub fn new(remote: Arc<R>, store: Arc<S>, base_url: Url) -> Self {
    Self {
      remote,
      store,
      base_url,
      writes: PendingWrites::new(),
    }
  }

  /// Wait for cache writes started by earlier loads.
  pub async fn flush_writes(&self) {
    self.writes.flush().await;
  }

  /// Load either resource shape.
  pub async fn load(&self, request: &ResourceRequest) -> FetchOutcome<Resource> {
    match request {
      ResourceRequest::Feed => self.load_feed().await.map(Resource::Feed),
      ResourceRequest::ImageData { url } => {
        self.load_image_data(url).await.map(Resource::ImageData)
      }
    }
  }

  /// Load the feed, falling back to the cached feed.
  pub async fn load_feed(&self) -> FetchOutcome<Vec<FeedImage>> {
    self
      .remote_with_local_fallback(&ResourceRequest::Feed, decode_feed)
      .await
  }

  /// Load the bytes behind an image URL, falling back to the cached bytes.
  pub async fn load_image_data(&self, url: &Url) -> FetchOutcome<ImageData> {
    let request = ResourceRequest::ImageData { url: url.clone() };
    self
      .remote_with_local_fallback(&request, decode_image_data)
      .await
  }

  /// Load comments for an image (remote only, not cached).
  pub async fn load_comments(&self, image_id: &str) -> FetchOutcome<Vec<ImageComment>> {
    let endpoint = Endpoint::ImageComments {
      image_id: image_id.to_string(),
    };
    let url = endpoint.url(&self.base_url)?;
    let response = self.remote.fetch(&url).await?;
    Ok(decode_comments(response)?)
  }

  async fn remote_with_local_fallback<T: Cacheable + Clone>(
    &self,
    request: &ResourceRequest,
    decode: Decoder<T>,
  ) -> FetchOutcome<T> {
    debug!(resource = %request.description(), "Loading");

    let key = request.cache_key();
    let key = key.as_str();
    let store = self.store.as_ref();
    let writes = &self.writes;

    fallback(
      move || {
        caching(
          move || self.fetch_remote(request, decode),
          Arc::clone(&self.store),
          key,
          writes,
        )
      },
      move || async move {
        match store.read::<T>(key).await {
          Ok(entry) => {
            debug!(key = %entry.key, written_at = %entry.written_at, "Serving cached value");
            Ok(entry.into_value())
          }
          Err(error) => {
            if error.is_miss() {
              debug!(key, "Nothing cached to fall back on");
            } else {
              warn!(key, %error, "Failed to read cached value");
            }
            Err(LoadError::from(error))
          }
        }
      },
    )
    .await
  }

  async fn fetch_remote<T>(&self, request: &ResourceRequest, decode: Decoder<T>) -> FetchOutcome<T> {
    let url = request.url(&self.base_url)?;
    let response = self.remote.fetch(&url).await?;
    Ok(decode(response)?)
  }
}

impl<R, S> Clone for CachedFeedClient<R, S> {
  fn clone(&self) -> Self {
    Self {
      remote: Arc::clone(&self.remote),
      store: Arc::clone(&self.store),
      base_url: self.base_url.clone(),
      writes: self.writes.clone(),
    }
  }
}
