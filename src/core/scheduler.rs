//! Cron-based scheduler that refreshes cached ticker lists and the forex rate

use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::services::{ForexService, TickerCatalog};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler disabled: interval_seconds is 0")]
    Disabled,
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },
}

/// Cron expression firing every `interval_seconds`
///
/// Format: second minute hour day month weekday
pub fn cron_expression(interval_seconds: u64) -> String {
    if interval_seconds >= 3600 && interval_seconds % 3600 == 0 {
        format!("0 0 */{} * * *", interval_seconds / 3600)
    } else if interval_seconds >= 60 {
        format!("0 */{} * * * *", interval_seconds / 60)
    } else {
        format!("*/{} * * * * *", interval_seconds)
    }
}

pub struct RefreshScheduler {
    catalog: Arc<TickerCatalog>,
    forex: Arc<ForexService>,
    schedule: Schedule,
    handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl RefreshScheduler {
    pub fn new(
        catalog: Arc<TickerCatalog>,
        forex: Arc<ForexService>,
        interval_seconds: u64,
    ) -> Result<Self, SchedulerError> {
        if interval_seconds == 0 {
            return Err(SchedulerError::Disabled);
        }

        let cron_expr = cron_expression(interval_seconds);
        let schedule = Schedule::from_str(&cron_expr).map_err(|e| SchedulerError::InvalidCron {
            expr: cron_expr.clone(),
            reason: e.to_string(),
        })?;

        info!(
            interval = interval_seconds,
            cron = %cron_expr,
            "RefreshScheduler: created with interval {}s (cron: {})",
            interval_seconds,
            cron_expr
        );

        Ok(Self {
            catalog,
            forex,
            schedule,
            handle: Arc::new(RwLock::new(None)),
        })
    }

    /// Refresh every ticker list and the forex rate once
    pub async fn run_once(&self) {
        refresh(&self.catalog, &self.forex).await;
    }

    pub async fn start(&self) {
        let mut guard = self.handle.write().await;
        if guard.is_some() {
            return;
        }

        let catalog = self.catalog.clone();
        let forex = self.forex.clone();
        let schedule = self.schedule.clone();

        *guard = Some(tokio::spawn(async move {
            info!("RefreshScheduler: started, waiting for cron schedule...");

            loop {
                let Some(next_tick) = schedule.upcoming(chrono::Utc).next() else {
                    warn!("RefreshScheduler: schedule has no upcoming ticks");
                    tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;
                    continue;
                };

                let now = chrono::Utc::now();
                if next_tick > now {
                    let duration = (next_tick - now).to_std().unwrap_or_default();
                    tokio::time::sleep(duration).await;
                }

                info!("RefreshScheduler: cron tick, refreshing caches");
                refresh(&catalog, &forex).await;
            }
        }));

        info!("RefreshScheduler: started successfully");
    }

    pub async fn stop(&self) {
        let mut handle = self.handle.write().await;
        if let Some(h) = handle.take() {
            h.abort();
            info!("RefreshScheduler: stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle.read().await.is_some()
    }
}

async fn refresh(catalog: &TickerCatalog, forex: &ForexService) {
    let counts = catalog.refresh_all().await;
    let total: usize = counts.iter().map(|(_, count)| count).sum();
    let rate = forex.refresh().await;
    info!(
        tickers = total,
        usd_inr = rate,
        "RefreshScheduler: refreshed {} tickers, USD/INR {}",
        total,
        rate
    );
}
