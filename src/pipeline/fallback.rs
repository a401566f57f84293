use std::fmt::Display;
use std::future::Future;

use futures::TryFutureExt;
use tracing::debug;

/// Run `primary`; only if it fails, run `secondary` and yield its outcome.
///
/// The primary error is dropped. `secondary` is never started while
/// `primary` is still pending.
pub async fn fallback<T, E1, E2, P, PF, S, SF>(primary: P, secondary: S) -> Result<T, E2>
where
  P: FnOnce() -> PF,
  PF: Future<Output = Result<T, E1>>,
  S: FnOnce() -> SF,
  SF: Future<Output = Result<T, E2>>,
  E1: Display,
{
  primary()
    .or_else(|error| {
      debug!(%error, "Primary source failed, trying secondary");
      secondary()
    })
    .await
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[tokio::test]
  async fn test_primary_success_skips_secondary() {
    let secondary_calls = AtomicUsize::new(0);

    let result: Result<i32, String> = fallback(
      || async { Ok::<_, String>(1) },
      || {
        secondary_calls.fetch_add(1, Ordering::SeqCst);
        async { Ok(2) }
      },
    )
    .await;

    assert_eq!(result, Ok(1));
    assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_primary_failure_yields_secondary_success() {
    let result: Result<i32, String> = fallback(
      || async { Err::<i32, _>("offline".to_string()) },
      || async { Ok(2) },
    )
    .await;

    assert_eq!(result, Ok(2));
  }

  #[tokio::test]
  async fn test_primary_failure_yields_secondary_failure() {
    let result: Result<i32, String> = fallback(
      || async { Err::<i32, _>("offline".to_string()) },
      || async { Err("not cached".to_string()) },
    )
    .await;

    // The primary error is not chained into the result
    assert_eq!(result, Err("not cached".to_string()));
  }

  #[tokio::test]
  async fn test_secondary_outcome_independent_of_primary_error() {
    for primary_error in ["timeout", "bad payload", ""] {
      let result: Result<i32, &str> = fallback(
        || async move { Err::<i32, _>(primary_error) },
        || async { Ok(7) },
      )
      .await;
      assert_eq!(result, Ok(7));
    }
  }

  #[tokio::test]
  async fn test_secondary_starts_after_primary_finishes() {
    let primary_done = AtomicUsize::new(0);
    let observed = AtomicUsize::new(usize::MAX);

    let result: Result<(), ()> = fallback(
      || async {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        primary_done.store(1, Ordering::SeqCst);
        Err::<(), _>("slow failure")
      },
      || {
        observed.store(primary_done.load(Ordering::SeqCst), Ordering::SeqCst);
        async { Ok(()) }
      },
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(observed.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_nothing_runs_until_awaited() {
    let primary_calls = AtomicUsize::new(0);

    let pending = fallback(
      || {
        primary_calls.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, String>(1) }
      },
      || async { Err::<i32, String>("unused".to_string()) },
    );
    assert_eq!(primary_calls.load(Ordering::SeqCst), 0);

    assert_eq!(pending.await, Ok(1));
    assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
  }
}
