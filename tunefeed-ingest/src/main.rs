//! tunefeed-ingest - catalog import and audio acquisition service
//!
//! Imports tracks from the catalog feed, fetches their preview audio and
//! synthesizes placeholder audio when real audio is unavailable.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tunefeed_common::config::LoggingConfig;
use tunefeed_common::events::EventBus;

use tunefeed_ingest::config::IngestConfig;
use tunefeed_ingest::models::MemoryCatalog;
use tunefeed_ingest::AppState;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "tunefeed-ingest")]
#[command(about = "Catalog import and audio acquisition service")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "TUNEFEED_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Audio storage directory
    #[arg(short, long)]
    storage_path: Option<PathBuf>,

    /// Start with preview downloads disabled (synthesized audio only)
    #[arg(long)]
    no_download: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = IngestConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(path) = args.storage_path {
        config.storage.path = path;
    }
    if args.no_download {
        config.fetch.enabled = false;
    }

    init_tracing(&config.logging)?;

    info!("Starting tunefeed-ingest");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        storage = %config.storage.path.display(),
        download_enabled = config.fetch.enabled,
        feed = %config.feed.base_url,
        "Configuration resolved"
    );

    let shutdown = CancellationToken::new();
    let state = AppState::from_config(
        &config,
        Arc::new(MemoryCatalog::new()),
        EventBus::new(100),
        shutdown.clone(),
    )?;

    // Storage must be usable before serving
    state
        .storage
        .ensure_directory()
        .await
        .context("Failed to initialize audio storage")?;
    state
        .storage
        .ensure_generic_fallback()
        .await
        .context("Failed to create generic fallback audio")?;

    match state.storage.snapshot().await {
        Ok(snapshot) => info!(
            files = snapshot.file_count,
            fallbacks = snapshot.fallback_count,
            size = %snapshot.formatted_size(),
            "Audio storage ready"
        ),
        Err(e) => warn!(error = %e, "Could not read audio storage statistics"),
    }

    let app = tunefeed_ingest::build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins over the configured level. A bare level such as `debug`
/// applies to this service's crates and the HTTP trace layer.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = logging.level.trim();
        if level.contains('=') {
            EnvFilter::new(level)
        } else {
            EnvFilter::new(format!(
                "tunefeed_ingest={level},tunefeed_common={level},tower_http={level}"
            ))
        }
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

/// Graceful shutdown signal handler
///
/// Cancels `shutdown` so pending retry delays end immediately.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }

    shutdown.cancel();
}
