//! Composable operators for dual-source loading.
//!
//! - `fallback` tries a primary producer and only then a secondary one
//! - `caching` writes successful values through to a cache store in the
//!   background, tracked by `PendingWrites`
//! - `CacheValidator` prunes the store on a lifecycle signal
//!
//! Producers are plain closures returning futures, so operators nest:
//!
//! ```ignore
//! fallback(
//!     || caching(|| fetch_and_decode(), Arc::clone(&store), key, &writes),
//!     || read_from(&store, key),
//! )
//! .await
//! ```

mod caching;
mod fallback;
mod validation;

pub use caching::{caching, PendingWrites};
pub use fallback::fallback;
pub use validation::CacheValidator;
