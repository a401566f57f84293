//! Feed API: domain types, decoders, the HTTP remote source, and the cached
//! client that wires them to the local store.

pub mod api_types;
pub mod cache;
pub mod cached_client;
pub mod client;
pub mod types;

pub use cache::ResourceRequest;
pub use cached_client::CachedFeedClient;
pub use client::HttpRemote;
pub use types::{FeedImage, ImageComment, Resource};
