//! Background samplers feeding the aggregator.
//!
//! Each sampler is a spawned task on a fixed interval. The caller aborts
//! the returned handle at shutdown.

use crate::error::ScrapeError;
use crate::metrics::Recorder;
use bench_core::{parse_status_vars, StatementCounts};
use bench_types::series;
use std::time::Duration;
use sysinfo::System;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Value recorded on `COCKROACH/ERROR` when a scrape fails.
const SCRAPE_ERROR_VALUE: f64 = 10.0;

/// Request timeout for one scrape.
const SCRAPE_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawn the host CPU sampler (`SYSTEM/CPU`, percent).
pub fn spawn_system_sampler(recorder: Recorder, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("System sampler started (interval: {:?})", period);

        let mut system = System::new();
        // Usage is computed between two refreshes
        system.refresh_cpu_usage();

        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await;

        loop {
            timer.tick().await;
            system.refresh_cpu_usage();
            let cpu = f64::from(system.global_cpu_usage());
            recorder.record_labeled(series::SYSTEM, "CPU", cpu).await;
        }
    })
}

/// Spawn the store status scraper (`COCKROACH/INSERT|SELECT|UPDATE`).
///
/// A baseline is fetched before the first tick. Each successful scrape then
/// records the statement count increase since the previous successful one;
/// a failed scrape records `COCKROACH/ERROR` and keeps the old baseline.
pub fn spawn_status_scraper(recorder: Recorder, url: String, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(url = %url, "Status scraper started (interval: {:?})", period);

        let client = match reqwest::Client::builder().timeout(SCRAPE_TIMEOUT).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(error = %e, "failed to build http client, scraper disabled");
                return;
            }
        };

        let mut baseline = match scrape(&client, &url).await {
            Ok(counts) => Some(counts),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "baseline scrape failed");
                None
            }
        };

        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;

            match scrape(&client, &url).await {
                Ok(counts) => {
                    if let Some(delta) = advance(&mut baseline, counts) {
                        recorder
                            .record_labeled(series::STORE, "INSERT", delta.inserts)
                            .await;
                        recorder
                            .record_labeled(series::STORE, "SELECT", delta.selects)
                            .await;
                        recorder
                            .record_labeled(series::STORE, "UPDATE", delta.updates)
                            .await;
                    }
                }
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "status scrape failed");
                    recorder
                        .record_labeled(series::STORE, series::ERROR, SCRAPE_ERROR_VALUE)
                        .await;
                }
            }
        }
    })
}

async fn scrape(client: &reqwest::Client, url: &str) -> Result<StatementCounts, ScrapeError> {
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(parse_status_vars(&body)?)
}

/// Move the baseline to `counts`, returning the increase over the old one.
///
/// Without a baseline the scrape only establishes one.
fn advance(
    baseline: &mut Option<StatementCounts>,
    counts: StatementCounts,
) -> Option<StatementCounts> {
    baseline.replace(counts).map(|before| counts.delta(&before))
}
