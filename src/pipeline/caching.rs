use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;
use tracing::warn;

use crate::cache::{CacheStore, Cacheable};

/// Cache writes that have been started and may still be running.
///
/// Clones share the same set. Dropping the last clone aborts whatever is
/// still in flight, so call `flush` before shutting down.
#[derive(Clone, Default)]
pub struct PendingWrites {
  tasks: Arc<Mutex<JoinSet<()>>>,
}

impl PendingWrites {
  pub fn new() -> Self {
    Self::default()
  }

  fn spawn(&self, task: impl Future<Output = ()> + Send + 'static) {
    let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
    // Reap finished writes so the set only holds running ones
    while tasks.try_join_next().is_some() {}
    tasks.spawn(task);
  }

  /// Wait for every write started so far.
  pub async fn flush(&self) {
    let mut tasks =
      std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
    while tasks.join_next().await.is_some() {}
  }
}

/// Run `operation` and write a successful value through to `store` under `key`.
///
/// Failures pass through untouched and are never written. The write runs on
/// its own task tracked by `writes`, so the value is returned without waiting
/// for it. A failed write is logged and otherwise invisible.
pub async fn caching<T, E, S, Op, Fut>(
  operation: Op,
  store: Arc<S>,
  key: &str,
  writes: &PendingWrites,
) -> Result<T, E>
where
  T: Cacheable + Clone,
  S: CacheStore + 'static,
  Op: FnOnce() -> Fut,
  Fut: Future<Output = Result<T, E>>,
{
  let value = operation().await?;

  let key = key.to_string();
  let cached = value.clone();
  writes.spawn(async move {
    if let Err(error) = store.write(&key, &cached).await {
      warn!(key = %key, entity = T::entity_type(), %error, "Failed to cache value");
    }
  });

  Ok(value)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::feed::types::ImageData;
  use crate::testing::SpyStore;
  use std::time::{Duration, Instant};

  #[tokio::test]
  async fn test_success_is_written_and_forwarded() {
    let store = Arc::new(SpyStore::new());
    let writes = PendingWrites::new();

    let result: Result<ImageData, String> = caching(
      || async { Ok(ImageData(vec![1, 2, 3])) },
      Arc::clone(&store),
      "key",
      &writes,
    )
    .await;
    writes.flush().await;

    assert_eq!(result, Ok(ImageData(vec![1, 2, 3])));
    assert_eq!(store.write_count(), 1);
    assert_eq!(
      store.written::<ImageData>(0),
      ("key".to_string(), ImageData(vec![1, 2, 3]))
    );
  }

  #[tokio::test]
  async fn test_write_failure_does_not_fail_the_operation() {
    let store = Arc::new(SpyStore::new().failing_writes());
    let writes = PendingWrites::new();

    let result: Result<ImageData, String> = caching(
      || async { Ok(ImageData(vec![9])) },
      Arc::clone(&store),
      "key",
      &writes,
    )
    .await;
    writes.flush().await;

    assert_eq!(result, Ok(ImageData(vec![9])));
    assert_eq!(store.write_count(), 1);
  }

  #[tokio::test]
  async fn test_slow_failing_write_does_not_delay_delivery() {
    let delay = Duration::from_millis(500);
    let store = Arc::new(SpyStore::new().failing_writes().with_write_delay(delay));
    let writes = PendingWrites::new();

    let started = Instant::now();
    let result: Result<ImageData, String> = caching(
      || async { Ok(ImageData(vec![1])) },
      Arc::clone(&store),
      "key",
      &writes,
    )
    .await;

    assert_eq!(result, Ok(ImageData(vec![1])));
    assert!(started.elapsed() < delay);
    // The write has not finished yet
    assert_eq!(store.write_count(), 0);

    writes.flush().await;
    assert_eq!(store.write_count(), 1);
  }

  #[tokio::test]
  async fn test_failure_is_forwarded_without_write() {
    let store = Arc::new(SpyStore::new());
    let writes = PendingWrites::new();

    let result: Result<ImageData, String> = caching(
      || async { Err("offline".to_string()) },
      Arc::clone(&store),
      "key",
      &writes,
    )
    .await;
    writes.flush().await;

    assert_eq!(result, Err("offline".to_string()));
    assert_eq!(store.write_count(), 0);
  }

  #[tokio::test]
  async fn test_outcome_is_independent_of_write_outcome() {
    let writes = PendingWrites::new();

    let with_ok: Result<ImageData, String> = caching(
      || async { Ok(ImageData(vec![4, 2])) },
      Arc::new(SpyStore::new()),
      "key",
      &writes,
    )
    .await;
    let with_failure: Result<ImageData, String> = caching(
      || async { Ok(ImageData(vec![4, 2])) },
      Arc::new(SpyStore::new().failing_writes()),
      "key",
      &writes,
    )
    .await;

    assert_eq!(with_ok, with_failure);
  }

  #[tokio::test]
  async fn test_flush_with_nothing_pending_returns() {
    PendingWrites::new().flush().await;
  }
}
