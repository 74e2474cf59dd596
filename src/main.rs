use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prefix_proxy::config::loader;
use prefix_proxy::{HttpServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prefix_proxy=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("prefix-proxy v0.1.0 starting");

    // Load configuration from the environment; a missing or invalid
    // UPSTREAM_URL is fatal here, before the listener binds.
    let config = loader::from_env()?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        target = %config.upstream.target,
        path_prefix = %config.upstream.path_prefix,
        "Configuration loaded"
    );

    if !config.upstream.is_secure {
        tracing::warn!(
            target = %config.upstream.target,
            "target is not https; upstream certificate validation is disabled"
        );
    }

    // Bind TCP listener
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        address = %local_addr,
        "Listening for connections"
    );

    // Translate Ctrl+C into the shutdown broadcast.
    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
            return;
        }
        tracing::info!("Shutdown signal received");
        shutdown.trigger();
    });

    // Create and run HTTP server
    let server = HttpServer::new(config)?;
    server.run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
