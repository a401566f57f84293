mod cache;
mod config;
mod error;
mod feed;
mod logging;
mod pipeline;
#[cfg(test)]
mod testing;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use tracing::info;
use url::Url;

use cache::{CacheStore, NoopStore, SqliteStore};
use config::Config;
use feed::{CachedFeedClient, HttpRemote, ImageComment, FeedImage, Resource, ResourceRequest};
use pipeline::CacheValidator;

/// Cache path that keeps everything in memory for a single run
const IN_MEMORY_PATH: &str = ":memory:";

#[derive(Parser, Debug)]
#[command(name = "feedcache")]
#[command(about = "Load the image feed, with a local cache for when the network is down")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/feedcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Feed API base URL
  #[arg(long)]
  base_url: Option<Url>,

  /// Don't read or write the local cache
  #[arg(long)]
  no_cache: bool,

  /// Mirror logs to stderr
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show the image feed
  Feed {
    #[arg(long)]
    json: bool,
  },
  /// Download the bytes behind an image URL
  Image {
    url: Url,
    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Show comments for an image (never cached)
  Comments {
    image_id: String,
    #[arg(long)]
    json: bool,
  },
  /// Prune expired cache entries
  Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Override settings from the command line
  if let Some(base_url) = args.base_url {
    config = Config { base_url, ..config }.validated()?;
  }
  if args.no_cache {
    config.cache.enabled = false;
  }

  let _log_guard = logging::init_tracing(&config, args.verbose)?;
  info!(base_url = %config.base_url, cache = config.cache.enabled, "feedcache starting");

  let remote = Arc::new(HttpRemote::new(config.request_timeout())?);

  if !config.cache.enabled {
    return run(args.command, &config, remote, Arc::new(NoopStore)).await;
  }

  let path = config.cache_path()?;
  let store = if path == Path::new(IN_MEMORY_PATH) {
    SqliteStore::open_in_memory(config.cache_max_age())?
  } else {
    SqliteStore::open(&path, config.cache_max_age())?
  };

  run(args.command, &config, remote, Arc::new(store)).await
}

/// Wire the loaders for one store and execute the command.
async fn run<S: CacheStore + 'static>(
  command: Command,
  config: &Config,
  remote: Arc<HttpRemote>,
  store: Arc<S>,
) -> Result<()> {
  let client = CachedFeedClient::new(remote, Arc::clone(&store), config.base_url.clone());
  let validator = CacheValidator::new(Arc::clone(&store));

  // `validate` prunes in the foreground, no need to signal again
  let pruned_in_foreground = matches!(command, Command::Validate);
  let result = execute(command, &client, store.as_ref()).await;

  // Writes started by the command are lost if the runtime shuts down first
  client.flush_writes().await;

  // The process going idle is our lifecycle signal. Wait for the prune so the
  // runtime doesn't cancel it on shutdown; its outcome is only logged.
  if !pruned_in_foreground {
    let _ = validator.on_background_signal().await;
  }

  result
}

async fn execute<S: CacheStore + 'static>(
  command: Command,
  client: &CachedFeedClient<HttpRemote, S>,
  store: &S,
) -> Result<()> {
  match command {
    Command::Feed { json } => {
      let resource = client.load(&ResourceRequest::Feed).await?;
      render(resource, json, None)
    }
    Command::Image { url, output } => {
      let resource = client.load(&ResourceRequest::ImageData { url }).await?;
      render(resource, false, output.as_deref())
    }
    Command::Comments { image_id, json } => {
      let comments = client.load_comments(&image_id).await?;
      print_comments(&comments, json)
    }
    Command::Validate => {
      let removed = store.invalidate().await?;
      println!("Removed {} invalid cache entries", removed);
      Ok(())
    }
  }
}

fn render(resource: Resource, json: bool, output: Option<&Path>) -> Result<()> {
  match resource {
    Resource::Feed(feed) => print_feed(&feed, json),
    Resource::ImageData(data) => match output {
      Some(path) => {
        std::fs::write(path, data.as_bytes())
          .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
        println!("Wrote {} bytes to {}", data.as_bytes().len(), path.display());
        Ok(())
      }
      None => {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(data.as_bytes())?;
        stdout.flush()?;
        Ok(())
      }
    },
  }
}

fn print_feed(feed: &[FeedImage], json: bool) -> Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(feed)?);
    return Ok(());
  }

  if feed.is_empty() {
    println!("The feed is empty");
  }
  for image in feed {
    println!("{}", image.id);
    if let Some(description) = &image.description {
      println!("  {}", description);
    }
    if let Some(location) = &image.location {
      println!("  @ {}", location);
    }
    println!("  {}", image.url);
  }
  Ok(())
}

fn print_comments(comments: &[ImageComment], json: bool) -> Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(comments)?);
    return Ok(());
  }

  if comments.is_empty() {
    println!("No comments");
  }
  for comment in comments {
    println!(
      "{} {}: {}",
      comment.created_at.format("%Y-%m-%d %H:%M"),
      comment.username,
      comment.message
    );
  }
  Ok(())
}
