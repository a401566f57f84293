//! Tracing setup.
//!
//! Logs go to `feedcache.log` in the log directory so that stdout stays
//! usable for command output. `--verbose` mirrors them to stderr.

use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

const LOG_FILE: &str = "feedcache.log";

/// Initialize the tracing subscriber.
///
/// The returned guard flushes buffered log lines on drop; keep it alive for
/// the whole run. `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &Config, verbose: bool) -> Result<WorkerGuard> {
  let directory = config.log_directory()?;
  std::fs::create_dir_all(&directory)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", directory.display(), e))?;

  let appender = tracing_appender::rolling::never(&directory, LOG_FILE);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

  let stderr = verbose.then(|| fmt::layer().with_writer(std::io::stderr));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .with(stderr)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
