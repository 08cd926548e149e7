//! TradeSentient Worker
//!
//! Keeps the shared ticker and forex caches warm on a cron schedule.
//! Can be run as a separate process/instance from the API server.

use dotenvy::dotenv;
use tokio::signal;
use tracing::info;
use tradesentient::config::Settings;
use tradesentient::core::runtime::ServiceContext;
use tradesentient::core::scheduler::RefreshScheduler;
use tradesentient::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    logging::init_logging();

    let settings = Settings::from_env()?;
    let interval = settings.refresh_interval_seconds;
    info!("Starting TradeSentient Worker");
    info!(environment = %settings.environment, "Environment");
    info!(interval = interval, "Cache refresh: every {} seconds", interval);

    let context = ServiceContext::connect(settings).await?;
    let scheduler = RefreshScheduler::new(context.catalog.clone(), context.forex.clone(), interval)?;

    info!("Running initial cache refresh...");
    scheduler.run_once().await;
    scheduler.start().await;

    info!("Worker started, waiting for shutdown signal...");
    signal::ctrl_c().await?;

    info!("Shutting down worker...");
    scheduler.stop().await;
    info!("Worker stopped");
    Ok(())
}
