use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// An image in the feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedImage {
  pub id: String,
  pub description: Option<String>,
  pub location: Option<String>,
  pub url: Url,
}

/// Raw bytes of an image, as served by the image URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData(pub Vec<u8>);

impl ImageData {
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }
}

/// A comment left on a feed image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageComment {
  pub id: String,
  pub message: String,
  pub created_at: DateTime<Utc>,
  pub username: String,
}

/// A loaded resource of either shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
  Feed(Vec<FeedImage>),
  ImageData(ImageData),
}
