//! castdeck-api - HTTP API for Castdeck
//!
//! Serves the scheduling, template, engagement and hashtag routes and the
//! `/events/ws` event stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use castdeck_api::{router, AppState};
use clap::Parser;
use libcastdeck::{logging, CastdeckService, Config};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "castdeck-api")]
#[command(version)]
#[command(about = "HTTP API for scheduling posts and tracking engagement")]
#[command(long_about = "\
castdeck-api - HTTP API for Castdeck

DESCRIPTION:
    Serves the Castdeck JSON API: connect accounts, schedule and cancel
    posts, manage content templates, record and query engagement, and
    explore hashtags. Lifecycle events stream over GET /events/ws.

    With --dispatch the dispatch loop runs inside this process as well, so
    websocket clients also see publish and failure events. Without it, run
    castdeck-send next to the API.

USAGE:
    castdeck-api
    castdeck-api --bind 0.0.0.0:8080 --dispatch

CONFIGURATION:
    Configuration file: ~/.config/castdeck/config.toml (or CASTDECK_CONFIG)
    Database location: ~/.local/share/castdeck/castdeck.db (or CASTDECK_DB_PATH)

    [server]
    bind = \"127.0.0.1:8080\"

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
")]
struct Cli {
    /// Address to listen on (overrides config)
    #[arg(long, value_name = "ADDR", env = "CASTDECK_BIND")]
    bind: Option<String>,

    /// Run the dispatch loop in this process
    #[arg(long)]
    dispatch: bool,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_default(cli.verbose);

    let config = Config::load_or_default().context("loading configuration")?;
    let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());

    let service = CastdeckService::from_config(config)
        .await
        .context("initializing service")?;
    info!(
        "Publishers enabled: {}",
        service.registry().names().join(", ")
    );

    let shutdown = Arc::new(AtomicBool::new(false));

    let dispatcher = if cli.dispatch {
        let dispatcher = service.dispatcher();
        let flag = shutdown.clone();
        Some(tokio::spawn(async move { dispatcher.run(flag).await }))
    } else {
        None
    };

    let app = router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {}", bind))?;
    info!("Castdeck API listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    if let Some(handle) = dispatcher {
        shutdown.store(true, Ordering::Relaxed);
        match handle.await {
            Ok(Err(e)) => error!("Dispatcher stopped with error: {}", e),
            Err(e) => error!("Dispatcher task panicked: {}", e),
            Ok(Ok(())) => {}
        }
    }

    info!("castdeck-api stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM and raises the shared shutdown flag
async fn shutdown_signal(shutdown: Arc<AtomicBool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal, stopping gracefully...");
    shutdown.store(true, Ordering::Relaxed);
}
