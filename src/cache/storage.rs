//! Cache storage trait and SQLite implementation.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{CacheEntry, Cacheable};
use crate::error::CacheError;

/// Trait for cache storage backends.
///
/// Implementations must be safe to share between concurrent loads.
pub trait CacheStore: Send + Sync {
  /// Read the entry stored under `key`, or `CacheError::Miss` if there is none.
  fn read<T: Cacheable>(
    &self,
    key: &str,
  ) -> impl Future<Output = Result<CacheEntry<T>, CacheError>> + Send;

  /// Store `value` under `key`, replacing any previous entry.
  fn write<T: Cacheable>(
    &self,
    key: &str,
    value: &T,
  ) -> impl Future<Output = Result<(), CacheError>> + Send;

  /// Drop entries that are no longer valid. Returns how many were removed.
  fn invalidate(&self) -> impl Future<Output = Result<usize, CacheError>> + Send;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - every read misses, writes are discarded.
pub struct NoopStore;

impl CacheStore for NoopStore {
  fn read<T: Cacheable>(
    &self,
    key: &str,
  ) -> impl Future<Output = Result<CacheEntry<T>, CacheError>> + Send {
    let key = key.to_string();
    async move { Err(CacheError::Miss { key }) }
  }

  fn write<T: Cacheable>(
    &self,
    _key: &str,
    _value: &T,
  ) -> impl Future<Output = Result<(), CacheError>> + Send {
    async { Ok(()) } // Discard
  }

  fn invalidate(&self) -> impl Future<Output = Result<usize, CacheError>> + Send {
    async { Ok(0) }
  }
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// (entity type, cache key)
type EntryId = (String, String);

/// SQLite-based cache storage implementation.
///
/// Entries older than `max_age` read as misses and are removed by `invalidate`.
/// So are entries whose payload failed to decode on a read, unless they were
/// rewritten since.
pub struct SqliteStore {
  conn: Mutex<Connection>,
  max_age: Duration,
  clock: Clock,
  undecodable: Mutex<HashSet<EntryId>>,
}

impl SqliteStore {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path, max_age: Duration) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn, max_age)
  }

  /// Open a private in-memory database. Nothing survives the process.
  pub fn open_in_memory(max_age: Duration) -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::with_connection(conn, max_age)
  }

  fn with_connection(conn: Connection, max_age: Duration) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
      max_age,
      clock: Box::new(Utc::now),
      undecodable: Mutex::new(HashSet::new()),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Replace the clock used to timestamp and expire entries.
  #[cfg(test)]
  pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
    self.clock = Box::new(clock);
    self
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("feedcache").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
    self
      .conn
      .lock()
      .map_err(|e| CacheError::Storage(format!("Lock poisoned: {}", e)))
  }

  fn undecodable(&self) -> MutexGuard<'_, HashSet<EntryId>> {
    self
      .undecodable
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  fn is_expired(&self, written_at: DateTime<Utc>) -> bool {
    (self.clock)() >= written_at + self.max_age
  }

  fn read_entry<T: Cacheable>(&self, key: &str) -> Result<CacheEntry<T>, CacheError> {
    let conn = self.lock()?;

    let row: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT data, written_at FROM cache_entries
         WHERE entity_type = ? AND cache_key = ?",
        params![T::entity_type(), key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| CacheError::Read {
        key: key.to_string(),
        reason: e.to_string(),
      })?;
    drop(conn);

    let Some((data, written_at)) = row else {
      return Err(CacheError::miss(key));
    };

    let written_at = parse_datetime(&written_at).map_err(|reason| CacheError::Read {
      key: key.to_string(),
      reason,
    })?;

    if self.is_expired(written_at) {
      debug!(key, %written_at, "Cache entry expired");
      return Err(CacheError::miss(key));
    }

    let value = match T::from_cache_bytes(&data) {
      Ok(value) => value,
      Err(e) => {
        self
          .undecodable()
          .insert((T::entity_type().to_string(), key.to_string()));
        return Err(CacheError::Read {
          key: key.to_string(),
          reason: e.to_string(),
        });
      }
    };

    Ok(CacheEntry::new(key, value, written_at))
  }

  fn write_entry<T: Cacheable>(&self, key: &str, value: &T) -> Result<(), CacheError> {
    let write_error = |reason: String| CacheError::Write {
      key: key.to_string(),
      reason,
    };

    let data = value.to_cache_bytes().map_err(|e| write_error(e.to_string()))?;
    let written_at = (self.clock)();

    let conn = self.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (entity_type, cache_key, data, written_at)
         VALUES (?, ?, ?, ?)",
        params![T::entity_type(), key, data, written_at.to_rfc3339()],
      )
      .map_err(|e| write_error(e.to_string()))?;

    self
      .undecodable()
      .remove(&(T::entity_type().to_string(), key.to_string()));

    Ok(())
  }

  fn prune(&self) -> Result<usize, CacheError> {
    let conn = self.lock()?;
    let storage_error = |e: rusqlite::Error| CacheError::Storage(e.to_string());

    let rows = {
      let mut stmt = conn
        .prepare("SELECT entity_type, cache_key, written_at FROM cache_entries")
        .map_err(storage_error)?;

      // A timestamp that isn't text reads as None
      let rows: Vec<(String, String, Option<String>)> = stmt
        .query_map([], |row| {
          Ok((row.get(0)?, row.get(1)?, row.get::<_, String>(2).ok()))
        })
        .map_err(storage_error)?
        .collect::<Result<_, _>>()
        .map_err(storage_error)?;
      rows
    };

    let mut undecodable = self.undecodable();

    // Unreadable timestamps and payloads are pruned along with expired entries
    let doomed: Vec<EntryId> = rows
      .into_iter()
      .filter(|(entity_type, key, written_at)| {
        if undecodable.contains(&(entity_type.clone(), key.clone())) {
          return true;
        }
        match written_at.as_deref().map(parse_datetime) {
          Some(Ok(written_at)) => self.is_expired(written_at),
          _ => true,
        }
      })
      .map(|(entity_type, key, _)| (entity_type, key))
      .collect();

    if doomed.is_empty() {
      return Ok(0);
    }

    conn
      .execute("BEGIN TRANSACTION", [])
      .map_err(storage_error)?;

    for (entity_type, key) in &doomed {
      if let Err(e) = conn.execute(
        "DELETE FROM cache_entries WHERE entity_type = ? AND cache_key = ?",
        params![entity_type, key],
      ) {
        let _ = conn.execute("ROLLBACK", []);
        return Err(storage_error(e));
      }
    }

    conn.execute("COMMIT", []).map_err(storage_error)?;

    for id in &doomed {
      undecodable.remove(id);
    }

    Ok(doomed.len())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    entity_type TEXT NOT NULL,
    cache_key TEXT NOT NULL,
    data BLOB NOT NULL,
    written_at TEXT NOT NULL,
    PRIMARY KEY (entity_type, cache_key)
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_written
    ON cache_entries(written_at);
"#;

impl CacheStore for SqliteStore {
  fn read<T: Cacheable>(
    &self,
    key: &str,
  ) -> impl Future<Output = Result<CacheEntry<T>, CacheError>> + Send {
    async move { self.read_entry(key) }
  }

  fn write<T: Cacheable>(
    &self,
    key: &str,
    value: &T,
  ) -> impl Future<Output = Result<(), CacheError>> + Send {
    async move { self.write_entry(key, value) }
  }

  fn invalidate(&self) -> impl Future<Output = Result<usize, CacheError>> + Send {
    async move { self.prune() }
  }
}

/// Parse a timestamp written by `write_entry`.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| format!("Failed to parse datetime '{}': {}", s, e))
}
