//! Polling driver
//!
//! Runs one scrape, group and send cycle per tick. A cycle finishes (or is
//! abandoned on error) before the next tick is awaited, so cycles never
//! overlap.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, instrument};

use crate::collector::{RetryConfig, ScrapeClient};
use crate::error::AppResult;
use crate::sender::{SendReport, Sender};
use crate::transformer::events_from_families;

/// Counts from one completed cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Metric families decoded from the scrape
    pub families: usize,
    /// Entity events produced
    pub groups: usize,
    /// Events accepted by the sender
    pub sent: usize,
    /// Events the sender could not deliver
    pub failed: usize,
}

/// Scrape-transform-send loop
pub struct Runner<S> {
    client: ScrapeClient,
    sender: S,
    interval: Duration,
    retry: RetryConfig,
}

impl<S: Sender> Runner<S> {
    pub fn new(client: ScrapeClient, sender: S, interval: Duration) -> Self {
        Self {
            client,
            sender,
            interval,
            retry: RetryConfig::default(),
        }
    }

    /// Override the scrape retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Run a single cycle
    #[instrument(skip(self), fields(url = %self.client.url()))]
    pub async fn run_once(&self) -> AppResult<CycleReport> {
        let families = self.client.scrape_with_retry(&self.retry).await?;

        let events = events_from_families(&families);

        let SendReport { sent, failed } = self.sender.send(&events).await?;

        let report = CycleReport {
            families: families.len(),
            groups: events.len(),
            sent,
            failed,
        };

        info!(
            families = report.families,
            groups = report.groups,
            sent = report.sent,
            failed = report.failed,
            "Cycle complete"
        );

        Ok(report)
    }

    /// Tick until `shutdown` resolves. The first cycle runs one interval
    /// after start.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Some(start) = Instant::now().checked_add(self.interval) else {
            error!(
                interval_secs = self.interval.as_secs(),
                "Polling interval out of range, not starting"
            );
            return;
        };
        let mut ticker = interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        info!(
            interval_secs = self.interval.as_secs(),
            url = %self.client.url(),
            "Polling started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = &mut shutdown => break,
                result = self.run_once() => {
                    if let Err(e) = result {
                        error!(error = %e, "Cycle failed");
                    }
                }
            }
        }

        info!("Polling stopped");
    }

    /// Tick until Ctrl+C or SIGTERM
    pub async fn run(&self) {
        self.run_until(shutdown_signal()).await;
    }
}

/// Wait for shutdown signal
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
