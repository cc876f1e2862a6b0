// ============================================================================
// Medal Stream Gateway
// ============================================================================
//
// Single entry point in front of the Olympic records services.
// It handles:
// - per-caller admission control
// - registration, login and refresh-token rotation
// - reference checks before forwarding writes to the owning service
// - the live update relay
//
// Stateless apart from the shared session store, so instances can be scaled
// horizontally behind a load balancer.
//
// ============================================================================

use anyhow::{Context, Result};
use medalstream::gateway::{GatewayState, build_router};
use medalstream_config::Config;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Medal Stream Gateway Starting ===");
    info!("Port: {}", config.port);
    info!("Session backend: {:?}", config.session_backend);
    info!(
        "Admission: {} req/s, burst {}",
        config.limiter.rate_per_second, config.limiter.burst
    );

    let state = GatewayState::from_config(&config).await?;
    let app = build_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port)
        .parse()
        .context("Failed to parse bind address")?;

    info!("Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Failed to start server")?;

    Ok(())
}
