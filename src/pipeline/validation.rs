use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;

/// Prunes the cache store when the application signals it is going idle.
pub struct CacheValidator<S> {
  store: Arc<S>,
}

impl<S: CacheStore + 'static> CacheValidator<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  /// Ask the store to invalidate expired entries in the background.
  ///
  /// Returns immediately. Errors are logged and dropped; the handle carries
  /// no status and may be ignored. Must be called from within a tokio runtime.
  pub fn on_background_signal(&self) -> JoinHandle<()> {
    let store = Arc::clone(&self.store);

    tokio::spawn(async move {
      match store.invalidate().await {
        Ok(0) => debug!("Cache validation found nothing to prune"),
        Ok(removed) => info!(removed, "Pruned invalid cache entries"),
        Err(error) => warn!(%error, "Cache validation failed"),
      }
    })
  }
}

impl<S> Clone for CacheValidator<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}
