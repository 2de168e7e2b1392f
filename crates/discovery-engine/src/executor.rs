use std::time::Duration;

use chrono::Utc;
use listing_search::{SearchQuery, SearchRecord};
use rand::Rng;
use rand::seq::IndexedRandom;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::cell::Cell;
use crate::engine::DiscoveryEngine;
use crate::types::SearchCallRecord;

/// Campaign-wide pacing state: a single shared clock and request counter,
/// not per-cell or per-worker.
pub(crate) struct RateGate {
    pub last_request: Option<tokio::time::Instant>,
    pub request_count: u64,
}

impl RateGate {
    pub fn new() -> Self {
        Self {
            last_request: None,
            request_count: 0,
        }
    }
}

/// Backoff delay for attempt `k` (0-indexed): `base * 2^k`, before jitter.
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

impl DiscoveryEngine {
    /// Block until the campaign-wide pacing budget allows another request,
    /// then stamp the shared clock. The gate stays locked across the wait so
    /// the check-and-update is serialized even with concurrent callers.
    pub(crate) async fn enforce_rate_limit(&self) {
        let min_interval = self.config.min_request_interval();
        let mut gate = self.rate.lock().await;

        if let Some(last) = gate.last_request {
            let elapsed = last.elapsed();
            if elapsed < min_interval {
                let wait = min_interval - elapsed;
                debug!("Rate limiting: sleeping {:.2}s", wait.as_secs_f64());
                sleep(wait).await;
            }
        }

        gate.last_request = Some(tokio::time::Instant::now());
        gate.request_count += 1;
    }

    /// Pick a client identity for one outbound call, `None` when rotation is
    /// disabled.
    fn select_identity(&mut self) -> Option<String> {
        if !self.config.rotate_identities {
            return None;
        }
        self.config.identity_pool.choose(&mut self.rng).cloned()
    }

    fn build_query(&mut self, cell: &Cell, pass_id: usize) -> SearchQuery {
        let (check_in, check_out) = self.config.dates_for_pass(pass_id);

        SearchQuery {
            ne_lat: cell.ne_lat,
            ne_long: cell.ne_long,
            sw_lat: cell.sw_lat,
            sw_long: cell.sw_long,
            check_in,
            check_out,
            zoom: self.config.zoom_for_pass(pass_id),
            price_min: self.config.price_min,
            price_max: self.config.price_max,
            currency: self.config.currency.clone(),
            client_identity: self.select_identity(),
        }
    }

    /// Execute one search call for a cell and pass, enforcing pacing before
    /// every attempt and retrying transient failures with jittered
    /// exponential backoff.
    ///
    /// Exhausted retries are reported, not escalated: the call yields an
    /// empty result list and a record carrying the consumed retry count with
    /// zero results, and the caller continues.
    pub(crate) async fn search_with_retry(
        &mut self,
        cell: &Cell,
        pass_id: usize,
    ) -> (Vec<SearchRecord>, SearchCallRecord) {
        let started = std::time::Instant::now();
        let mut retry_count = 0u32;

        for attempt in 0..=self.config.max_retries {
            self.enforce_rate_limit().await;
            let query = self.build_query(cell, pass_id);

            let date_str = if query.check_in.is_empty() {
                "blank (all listings)".to_string()
            } else {
                format!("{} to {}", query.check_in, query.check_out)
            };
            debug!(
                "Search cell={} pass={} dates={} zoom={} attempt={}",
                cell.identity(),
                pass_id,
                date_str,
                query.zoom,
                attempt
            );

            match self.provider.search(&query).await {
                Ok(results) => {
                    let record = SearchCallRecord {
                        cell_id: cell.identity(),
                        grid_id: cell.grid_id,
                        pass_id,
                        results_count: results.len(),
                        subdivided: false,
                        retry_count,
                        duration_seconds: started.elapsed().as_secs_f64(),
                        timestamp: Utc::now(),
                    };
                    return (results, record);
                }
                Err(e) => {
                    if attempt < self.config.max_retries {
                        retry_count += 1;
                        let delay = backoff_delay(self.config.retry_delay_base, attempt);
                        let jittered = delay + delay.mul_f64(self.rng.random_range(0.0..0.2));
                        warn!(
                            "Search failed (attempt {}), retrying in {:.1}s: {}",
                            attempt + 1,
                            jittered.as_secs_f64(),
                            e
                        );
                        sleep(jittered).await;
                    } else {
                        error!(
                            "Search failed after {} attempts: {}",
                            self.config.max_retries + 1,
                            e
                        );
                    }
                }
            }
        }

        let record = SearchCallRecord {
            cell_id: cell.identity(),
            grid_id: cell.grid_id,
            pass_id,
            results_count: 0,
            subdivided: false,
            retry_count,
            duration_seconds: started.elapsed().as_secs_f64(),
            timestamp: Utc::now(),
        };

        (Vec::new(), record)
    }
}
