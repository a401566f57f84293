//! Remote source for the feed API.
//!
//! The remote source only moves bytes: any HTTP status is handed to the
//! decoders, and only a failure to get a response at all is a transport error.

use std::future::Future;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use tracing::debug;
use url::Url;

use crate::error::TransportError;

/// User-Agent sent with every request.
const USER_AGENT: &str = concat!("feedcache/", env!("CARGO_PKG_VERSION"));

/// Raw output of a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
  pub status: u16,
  pub body: Vec<u8>,
}

/// Trait for the remote side of a load.
pub trait RemoteSource: Send + Sync {
  /// Perform a single GET request.
  fn fetch(&self, url: &Url) -> impl Future<Output = Result<RemoteResponse, TransportError>> + Send;
}

/// API endpoints relative to the configured base URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
  /// The image feed
  Feed,
  /// Comments for a single image
  ImageComments { image_id: String },
}

impl Endpoint {
  pub fn url(&self, base: &Url) -> Result<Url, TransportError> {
    let mut url = base.clone();
    {
      let mut segments = url
        .path_segments_mut()
        .map_err(|_| TransportError::Other(format!("Base URL cannot have a path: {}", base)))?;
      segments.pop_if_empty();
      match self {
        Self::Feed => {
          segments.extend(["v1", "feed"]);
        }
        Self::ImageComments { image_id } => {
          segments.extend(["v1", "image", image_id.as_str(), "comments"]);
        }
      }
    }
    Ok(url)
  }
}

/// HTTP remote source backed by reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpRemote {
  client: reqwest::Client,
}

impl HttpRemote {
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(USER_AGENT)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

impl RemoteSource for HttpRemote {
  fn fetch(&self, url: &Url) -> impl Future<Output = Result<RemoteResponse, TransportError>> + Send {
    let request = self.client.get(url.clone());
    let url = url.clone();

    async move {
      let response = request.send().await?;
      let status = response.status().as_u16();
      let body = response.bytes().await?.to_vec();

      debug!(%url, status, bytes = body.len(), "Remote response");
      Ok(RemoteResponse { status, body })
    }
  }
}
