//! TradeSentient API Server
//!
//! HTTP ingestion, ticker and forex lookups, and the `/ws` delivery endpoint.
//! Instances share events through the Redis broker when it is reachable.

use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info, warn};
use tradesentient::config::Settings;
use tradesentient::core::http::start_server;
use tradesentient::core::runtime::ServiceContext;
use tradesentient::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging();

    let settings = Settings::from_env()?;
    let port = settings.port;
    info!("Starting TradeSentient API Server");
    info!(environment = %settings.environment, "Environment");
    info!(
        short_window = settings.short_window,
        long_window = settings.long_window,
        "Signal engine: SMA{} / SMA{}",
        settings.short_window,
        settings.long_window
    );

    let context = ServiceContext::connect(settings).await?;
    context.start().await;

    // Warm the ticker and forex caches without delaying startup
    let catalog = context.catalog.clone();
    let forex = context.forex.clone();
    tokio::spawn(async move {
        let counts = catalog.refresh_all().await;
        let rate = forex.usd_inr_rate().await;
        info!(classes = counts.len(), usd_inr = rate, "Startup cache warm-up complete");
    });

    let state = context.app_state();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(state, port).await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("API server started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down API server...");
        }
        _ = server_handle => {
            warn!("HTTP server stopped");
        }
    }

    context.shutdown().await;
    info!("API server stopped");
    Ok(())
}
