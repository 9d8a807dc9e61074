use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelscout_core::{load_config, validate_config, ChannelHandoff, QueryCoordinator};
use reelscout_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for the download hand-off queue
const HANDOFF_BUFFER_SIZE: usize = 256;

/// Connect timeout shared by every outbound HTTP call
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("REELSCOUT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;
    info!("Configuration loaded successfully (version {})", VERSION);

    // One HTTP client for every source and provider
    let client = reqwest::Client::builder()
        .user_agent(format!("reelscout/{}", VERSION))
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    // Download hand-off queue. Nothing launches downloads yet; queued links
    // are logged.
    let (handoff, receiver) = ChannelHandoff::channel(HANDOFF_BUFFER_SIZE);
    let handoff_task = tokio::spawn(drain_handoffs(receiver));

    let coordinator = QueryCoordinator::from_config(&config, client)
        .context("Failed to build sources and providers")?
        .with_handoff(Arc::new(handoff));

    if coordinator.sources().is_empty() {
        error!("No torrent sources enabled; every search will be rejected");
    }
    info!(
        "Sources: {:?}, providers: {:?}",
        coordinator.sources().ids(),
        coordinator.providers().ids()
    );

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), Arc::new(coordinator)));
    info!("Config hash: {}", state.config_hash());

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    // The router (and with it the last sender) is gone, so the drain ends.
    let _ = handoff_task.await;
    info!("Hand-off queue drained");

    Ok(())
}

async fn drain_handoffs(mut receiver: mpsc::Receiver<String>) {
    while let Some(link) = receiver.recv().await {
        info!(link = %link, "Download requested");
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
}
