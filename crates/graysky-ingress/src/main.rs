//! graysky-ingress - firehose ingress daemon.
//!
//! Subscribes to a `com.atproto.sync.subscribeRepos` stream and keeps a
//! SQLite projection of posts and reply linkage up to date, resuming from the
//! stored cursor after restarts.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use graysky_core::ServiceUrl;
use graysky_firehose::{Subscriber, WsConnector};
use graysky_store::{Database, PostProjection, SqliteCursorStore};

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs);

    let service = ServiceUrl::new(&cli.service).context("Invalid firehose service URL")?;
    let db_path = cli.database_path()?;
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    info!(
        version = env!("GRAYSKY_VERSION"),
        service = %service,
        database = %db_path.display(),
        "Starting graysky-ingress"
    );

    let mut subscriber = Subscriber::new(
        WsConnector::new(service.clone()),
        PostProjection::new(db.clone()),
        SqliteCursorStore::new(db, &service),
        cli.subscriber_config(),
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    subscriber
        .run(shutdown)
        .await
        .context("Firehose subscription failed")?;

    info!("Shut down cleanly");
    Ok(())
}

fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}

/// Cancel `token` on Ctrl+C or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl+C, shutting down");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        }
    }

    token.cancel();
}
