//! castdeck-send - Background daemon for scheduled posting
//!
//! Polls the post queue and publishes every post whose time has come, then
//! refreshes engagement counters of published posts.

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use libcastdeck::{logging, CastdeckError, CastdeckService, Config};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "castdeck-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled posting")]
#[command(long_about = "\
castdeck-send - Background daemon for scheduled posting

DESCRIPTION:
    castdeck-send is a long-running daemon that watches the Castdeck queue
    and publishes scheduled posts when they are due.

    Each poll claims due posts, publishes them through the account's
    platform, and records the outcome. Retryable failures (network errors,
    rate limits, timeouts) are retried with exponential backoff up to
    dispatch.max_attempts. Engagement counters of published posts are
    refreshed every dispatch.metrics_refresh_interval seconds.

    Several instances may share one database; a post is only ever
    published by one of them.

USAGE:
    # Run in foreground (logs to stderr)
    castdeck-send

    # Poll every 10 seconds
    castdeck-send --poll-interval 10

    # Process due posts once and exit
    castdeck-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current poll)

CONFIGURATION:
    Configuration file: ~/.config/castdeck/config.toml (or CASTDECK_CONFIG)
    Database location: ~/.local/share/castdeck/castdeck.db (or CASTDECK_DB_PATH)

    [dispatch]
    poll_interval = 30     # seconds between polls
    max_attempts = 3       # attempts before a post fails
    retry_delay = 60       # base delay, doubled per attempt
    publish_timeout = 10   # seconds per publish call

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Process due posts once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_default(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> libcastdeck::Result<()> {
    let mut config = Config::load_or_default()?;
    if let Some(seconds) = cli.poll_interval {
        config.dispatch.poll_interval = seconds;
        config.validate()?;
    }

    let service = CastdeckService::from_config(config).await?;
    let dispatcher = service.dispatcher();

    info!("castdeck-send daemon starting");
    info!(
        "Publishers enabled: {}",
        service.registry().names().join(", ")
    );

    if cli.once {
        let report = dispatcher.run_once(Utc::now()).await;
        info!(
            "castdeck-send: processed posts once ({} published, {} retried, {} failed), exiting",
            report.published, report.retried, report.failed
        );
    } else {
        let shutdown = Arc::new(AtomicBool::new(false));
        setup_signal_handlers(shutdown.clone())?;
        dispatcher.run(shutdown).await?;
    }

    service.database().close().await;
    info!("castdeck-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> libcastdeck::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        CastdeckError::InvalidArgument(format!("Signal setup failed: {}", e))
    })?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("Received signal {}, stopping gracefully...", sig);
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> libcastdeck::Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
    Ok(())
}
