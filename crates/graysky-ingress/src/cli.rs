//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;

use graysky_firehose::SubscriberConfig;

/// Subscribe to an AT Protocol firehose and project posts into SQLite.
#[derive(Parser, Debug)]
#[command(name = "graysky-ingress")]
#[command(author, version = env!("GRAYSKY_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Firehose service, e.g. wss://bsky.network
    #[arg(long, env = "FEEDGEN_SUBSCRIPTION_ENDPOINT")]
    pub service: String,

    /// SQLite database file [default: <data dir>/ingress.db]
    #[arg(long, env = "FEEDGEN_SQLITE_LOCATION")]
    pub database: Option<PathBuf>,

    /// First reconnect delay in milliseconds
    #[arg(long, env = "FEEDGEN_SUBSCRIPTION_RECONNECT_DELAY", default_value_t = 3000)]
    pub reconnect_delay_ms: u64,

    /// Longest reconnect delay in milliseconds
    #[arg(long, default_value_t = 60_000)]
    pub max_reconnect_delay_ms: u64,

    /// Abandon a connection attempt after this many seconds
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub connect_timeout_secs: u64,

    /// Reconnect when no frame arrives for this many seconds
    #[arg(long, default_value_t = 60)]
    pub idle_timeout_secs: u64,

    /// Save the cursor after this many events
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..))]
    pub cursor_flush_every: u32,

    /// Frames buffered between the socket and the database
    #[arg(long, default_value_t = 1024, value_parser = parse_capacity)]
    pub queue_capacity: usize,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    /// The configured database path, or the per-user default.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => default_database_path(),
        }
    }

    pub fn subscriber_config(&self) -> SubscriberConfig {
        SubscriberConfig {
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            max_reconnect_delay: Duration::from_millis(self.max_reconnect_delay_ms),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            queue_capacity: self.queue_capacity,
            cursor_flush_every: self.cursor_flush_every,
            ..SubscriberConfig::default()
        }
    }
}

fn default_database_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "graysky")
        .context("Could not determine data directory; pass --database")?;
    Ok(dirs.data_dir().join("ingress.db"))
}

fn parse_capacity(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
