//! Serde-deserializable types matching the feed API responses, and the
//! decoders that turn raw responses into domain values.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::error::DecodingError;

use super::client::RemoteResponse;
use super::types::{FeedImage, ImageComment, ImageData};

const OK: u16 = 200;

// ============================================================================
// Feed endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiFeedResponse {
  items: Vec<ApiFeedItem>,
}

#[derive(Debug, Deserialize)]
struct ApiFeedItem {
  id: String,
  description: Option<String>,
  location: Option<String>,
  image: Url,
}

impl ApiFeedItem {
  fn into_image(self) -> FeedImage {
    FeedImage {
      id: self.id,
      description: self.description,
      location: self.location,
      url: self.image,
    }
  }
}

// ============================================================================
// Image comments endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiCommentsResponse {
  items: Vec<ApiComment>,
}

#[derive(Debug, Deserialize)]
struct ApiComment {
  id: String,
  message: String,
  created_at: DateTime<Utc>,
  author: ApiAuthor,
}

#[derive(Debug, Deserialize)]
struct ApiAuthor {
  username: String,
}

impl ApiComment {
  fn into_comment(self) -> ImageComment {
    ImageComment {
      id: self.id,
      message: self.message,
      created_at: self.created_at,
      username: self.author.username,
    }
  }
}

// ============================================================================
// Decoders
// ============================================================================

/// Decode the feed list. Only a 200 with a well-formed body is accepted.
pub fn decode_feed(response: RemoteResponse) -> Result<Vec<FeedImage>, DecodingError> {
  if response.status != OK {
    return Err(DecodingError::UnexpectedStatus(response.status));
  }

  let feed: ApiFeedResponse = serde_json::from_slice(&response.body)?;
  Ok(feed.items.into_iter().map(ApiFeedItem::into_image).collect())
}

/// Decode image bytes. An empty 200 is not an image.
pub fn decode_image_data(response: RemoteResponse) -> Result<ImageData, DecodingError> {
  if response.status != OK {
    return Err(DecodingError::UnexpectedStatus(response.status));
  }
  if response.body.is_empty() {
    return Err(DecodingError::EmptyBody);
  }

  Ok(ImageData(response.body))
}

/// Decode image comments. Any 2xx status is accepted.
pub fn decode_comments(response: RemoteResponse) -> Result<Vec<ImageComment>, DecodingError> {
  if !(200..300).contains(&response.status) {
    return Err(DecodingError::UnexpectedStatus(response.status));
  }

  let comments: ApiCommentsResponse = serde_json::from_slice(&response.body)?;
  Ok(
    comments
      .items
      .into_iter()
      .map(ApiComment::into_comment)
      .collect(),
  )
}
