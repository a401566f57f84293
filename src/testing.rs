//! Test doubles for the remote source and the cache store.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use url::Url;

use crate::cache::{CacheEntry, CacheStore, Cacheable};
use crate::error::{CacheError, TransportError};
use crate::feed::client::{RemoteResponse, RemoteSource};
use crate::feed::types::FeedImage;

// ============================================================================
// Fixtures
// ============================================================================

pub fn image(id: &str) -> FeedImage {
  FeedImage {
    id: id.to_string(),
    description: Some(format!("description {}", id)),
    location: Some(format!("location {}", id)),
    url: Url::parse(&format!("https://example.com/images/{}.jpg", id)).unwrap(),
  }
}

/// Feed API body for `images`.
pub fn feed_body(images: &[FeedImage]) -> Vec<u8> {
  let items: Vec<_> = images
    .iter()
    .map(|image| {
      json!({
        "id": image.id,
        "description": image.description,
        "location": image.location,
        "image": image.url.as_str(),
      })
    })
    .collect();

  serde_json::to_vec(&json!({ "items": items })).unwrap()
}

pub fn base_url() -> Url {
  Url::parse("https://api.example.com/essential-feed").unwrap()
}

// ============================================================================
// Remote source stub
// ============================================================================

#[derive(Clone)]
enum Reply {
  Response(RemoteResponse),
  Failure(String),
}

/// Remote source that answers every request the same way.
pub struct StubRemote {
  reply: Reply,
  requests: Mutex<Vec<Url>>,
}

impl StubRemote {
  pub fn responding(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      reply: Reply::Response(RemoteResponse {
        status,
        body: body.into(),
      }),
      requests: Mutex::new(Vec::new()),
    }
  }

  pub fn failing(reason: &str) -> Self {
    Self {
      reply: Reply::Failure(reason.to_string()),
      requests: Mutex::new(Vec::new()),
    }
  }

  pub fn call_count(&self) -> usize {
    self.requests.lock().unwrap().len()
  }

  pub fn requested_urls(&self) -> Vec<Url> {
    self.requests.lock().unwrap().clone()
  }
}

impl RemoteSource for StubRemote {
  fn fetch(&self, url: &Url) -> impl Future<Output = Result<RemoteResponse, TransportError>> + Send {
    self.requests.lock().unwrap().push(url.clone());
    let reply = self.reply.clone();

    async move {
      match reply {
        Reply::Response(response) => Ok(response),
        Reply::Failure(reason) => Err(TransportError::Other(reason)),
      }
    }
  }
}

// ============================================================================
// Cache store spy
// ============================================================================

/// In-memory cache store that records every call.
#[derive(Default)]
pub struct SpyStore {
  entries: Mutex<HashMap<String, Vec<u8>>>,
  writes: Mutex<Vec<(String, Vec<u8>)>>,
  reads: AtomicUsize,
  invalidations: AtomicUsize,
  fail_writes: bool,
  fail_invalidate: bool,
  invalidate_delay: Option<Duration>,
  write_delay: Option<Duration>,
}

impl SpyStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn failing_writes(mut self) -> Self {
    self.fail_writes = true;
    self
  }

  pub fn failing_invalidate(mut self) -> Self {
    self.fail_invalidate = true;
    self
  }

  pub fn with_invalidate_delay(mut self, delay: Duration) -> Self {
    self.invalidate_delay = Some(delay);
    self
  }

  /// Delay every write; the attempt is recorded once the delay has passed.
  pub fn with_write_delay(mut self, delay: Duration) -> Self {
    self.write_delay = Some(delay);
    self
  }

  /// Put a value in the store without recording a write.
  pub fn seed<T: Cacheable>(self, key: &str, value: &T) -> Self {
    self
      .entries
      .lock()
      .unwrap()
      .insert(entry_key::<T>(key), value.to_cache_bytes().unwrap());
    self
  }

  pub fn write_count(&self) -> usize {
    self.writes.lock().unwrap().len()
  }

  /// The `index`th write attempt, decoded.
  pub fn written<T: Cacheable>(&self, index: usize) -> (String, T) {
    let writes = self.writes.lock().unwrap();
    let (key, bytes) = &writes[index];
    (key.clone(), T::from_cache_bytes(bytes).unwrap())
  }

  pub fn read_count(&self) -> usize {
    self.reads.load(Ordering::SeqCst)
  }

  pub fn invalidate_count(&self) -> usize {
    self.invalidations.load(Ordering::SeqCst)
  }

  fn record_write<T: Cacheable>(&self, key: &str, value: &T) -> Result<(), CacheError> {
    let bytes = value.to_cache_bytes()?;
    self
      .writes
      .lock()
      .unwrap()
      .push((key.to_string(), bytes.clone()));

    if self.fail_writes {
      return Err(CacheError::Write {
        key: key.to_string(),
        reason: "disk full".to_string(),
      });
    }

    self
      .entries
      .lock()
      .unwrap()
      .insert(entry_key::<T>(key), bytes);
    Ok(())
  }

  fn record_read<T: Cacheable>(&self, key: &str) -> Result<CacheEntry<T>, CacheError> {
    self.reads.fetch_add(1, Ordering::SeqCst);

    let entries = self.entries.lock().unwrap();
    let bytes = entries
      .get(&entry_key::<T>(key))
      .ok_or_else(|| CacheError::miss(key))?;
    Ok(CacheEntry::new(key, T::from_cache_bytes(bytes)?, Utc::now()))
  }
}

fn entry_key<T: Cacheable>(key: &str) -> String {
  format!("{}:{}", T::entity_type(), key)
}

impl CacheStore for SpyStore {
  fn read<T: Cacheable>(
    &self,
    key: &str,
  ) -> impl Future<Output = Result<CacheEntry<T>, CacheError>> + Send {
    async move { self.record_read(key) }
  }

  fn write<T: Cacheable>(
    &self,
    key: &str,
    value: &T,
  ) -> impl Future<Output = Result<(), CacheError>> + Send {
    async move {
      if let Some(delay) = self.write_delay {
        tokio::time::sleep(delay).await;
      }
      self.record_write(key, value)
    }
  }

  fn invalidate(&self) -> impl Future<Output = Result<usize, CacheError>> + Send {
    async move {
      self.invalidations.fetch_add(1, Ordering::SeqCst);
      if let Some(delay) = self.invalidate_delay {
        tokio::time::sleep(delay).await;
      }
      if self.fail_invalidate {
        return Err(CacheError::Storage("store unavailable".to_string()));
      }
      Ok(0)
    }
  }
}
