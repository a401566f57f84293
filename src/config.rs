use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::cache::SqliteStore;

const DEFAULT_BASE_URL: &str = "https://ile-api.essentialdeveloper.com/essential-feed";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Root of the feed API
  pub base_url: Url,
  pub http: HttpConfig,
  pub cache: CacheConfig,
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// When false, nothing is written and offline loads always fail
  pub enabled: bool,
  /// Database file (defaults to $XDG_DATA_HOME/feedcache/cache.db)
  pub path: Option<PathBuf>,
  /// Entries older than this read as misses and are pruned
  pub max_age_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Default filter when RUST_LOG is not set
  pub level: String,
  /// Log file directory (defaults to the data directory)
  pub directory: Option<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
      http: HttpConfig::default(),
      cache: CacheConfig::default(),
      log: LogConfig::default(),
    }
  }
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self { timeout_secs: 30 }
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
      max_age_days: 7,
    }
  }
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      directory: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./feedcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/feedcache/config.yaml
  ///
  /// Falls back to defaults when no file is found. `FEEDCACHE_BASE_URL`
  /// overrides the base URL either way.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        debug!("No configuration file found, using defaults");
        Self::default()
      }
    };

    config.with_env_overrides()?.validated()
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("feedcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("feedcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self> {
    Ok(serde_yaml::from_str(contents)?)
  }

  fn with_env_overrides(mut self) -> Result<Self> {
    if let Ok(raw) = std::env::var("FEEDCACHE_BASE_URL") {
      self.base_url =
        Url::parse(&raw).map_err(|e| eyre!("Invalid FEEDCACHE_BASE_URL '{}': {}", raw, e))?;
    }
    Ok(self)
  }

  /// Reject settings the loaders cannot work with.
  pub fn validated(self) -> Result<Self> {
    if self.base_url.cannot_be_a_base() || !matches!(self.base_url.scheme(), "http" | "https") {
      return Err(eyre!("Base URL must be an http(s) URL: {}", self.base_url));
    }
    if self.http.timeout_secs == 0 {
      return Err(eyre!("http.timeout_secs must be greater than zero"));
    }
    Ok(self)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.http.timeout_secs)
  }

  pub fn cache_max_age(&self) -> chrono::Duration {
    chrono::Duration::days(i64::from(self.cache.max_age_days))
  }

  /// Resolved cache database path.
  pub fn cache_path(&self) -> Result<PathBuf> {
    match &self.cache.path {
      Some(path) => Ok(path.clone()),
      None => SqliteStore::default_path(),
    }
  }

  /// Resolved log directory.
  pub fn log_directory(&self) -> Result<PathBuf> {
    match &self.log.directory {
      Some(dir) => Ok(dir.clone()),
      None => {
        let data_dir = dirs::data_dir()
          .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
          .ok_or_else(|| eyre!("Could not determine data directory"))?;
        Ok(data_dir.join("feedcache"))
      }
    }
  }
}
