use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One entry in a per-pass parameter schedule: either an explicit value or
/// "let the provider use its default" (blank dates, default stay length).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassValue<T> {
    /// Use this value for the pass
    Explicit(T),
    /// Leave the parameter blank so the provider applies its default
    ProviderDefault,
}

/// Select the schedule entry for a pass: pass index modulo schedule length.
/// Returns `None` for an empty schedule; callers fall back to a documented
/// default instead of failing the run.
pub fn cycle<T>(schedule: &[T], pass_id: usize) -> Option<&T> {
    if schedule.is_empty() {
        None
    } else {
        Some(&schedule[pass_id % schedule.len()])
    }
}

/// Immutable campaign configuration. Constructed once per campaign, passed by
/// reference thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Campaign-wide request pacing ceiling
    pub requests_per_minute: u32,

    /// Base delay for exponential retry backoff
    pub retry_delay_base: Duration,

    /// Additional attempts after the first failed one
    pub max_retries: u32,

    /// Result count at which a cell is treated as likely truncated by the
    /// provider and subdivided. A heuristic, not a confirmed exact cap.
    pub max_results_before_subdivide: usize,

    /// Cells smaller than this (degrees, max span) are never subdivided
    pub min_cell_size_degrees: f64,

    /// Maximum quadtree depth below a root cell
    pub max_subdivision_depth: u32,

    /// Number of discovery passes per root cell
    pub num_passes: usize,

    /// Check-in offsets in days from today, cycled by pass index.
    /// `ProviderDefault` entries run the pass with blank dates — the
    /// authoritative baseline that sees booked-out listings too.
    pub checkin_offsets: Vec<PassValue<i64>>,

    /// Stay lengths in nights, cycled by pass index to catch minimum-stay
    /// requirements. `ProviderDefault` falls back to `default_stay_nights`.
    pub stay_nights: Vec<PassValue<u32>>,

    /// Map zoom levels, cycled by pass index to catch tile-level variance
    pub zoom_levels: Vec<u32>,

    /// Stay length used when the schedule declines to pick one
    pub default_stay_nights: u32,

    /// Minimum nightly price filter
    pub price_min: u32,

    /// Maximum nightly price filter
    pub price_max: u32,

    /// ISO currency code for the price filter
    pub currency: String,

    /// Whether to rotate client identities per request
    pub rotate_identities: bool,

    /// Identity pool drawn from when rotation is enabled
    pub identity_pool: Vec<String>,

    /// Whether to cache per-(cell, pass) results for resumption
    pub enable_cache: bool,

    /// Cache directory location
    pub cache_dir: PathBuf,

    /// Seed for jitter and identity selection; fixed seeds make retry timing
    /// and identity choice deterministic in tests
    pub rng_seed: Option<u64>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 20,
            retry_delay_base: Duration::from_secs(2),
            max_retries: 3,
            max_results_before_subdivide: 280,
            min_cell_size_degrees: 0.001, // roughly 100m
            max_subdivision_depth: 4,
            num_passes: 3,
            checkin_offsets: vec![PassValue::ProviderDefault],
            stay_nights: vec![
                PassValue::Explicit(1),
                PassValue::Explicit(2),
                PassValue::Explicit(3),
                PassValue::Explicit(7),
            ],
            zoom_levels: vec![14, 15, 16],
            default_stay_nights: 2,
            price_min: 300,
            price_max: 10_000,
            currency: "USD".to_string(),
            rotate_identities: true,
            identity_pool: listing_search::identity::default_pool(),
            enable_cache: true,
            cache_dir: PathBuf::from("data/discovery_cache"),
            rng_seed: None,
        }
    }
}

impl DiscoveryConfig {
    /// Fill documented defaults for any configuration violation instead of
    /// failing the run: empty schedules get single-entry fallbacks and a
    /// zero pacing ceiling becomes the conservative default.
    pub fn validated(mut self) -> Self {
        if self.requests_per_minute == 0 {
            warn!("requests_per_minute is 0, falling back to 20");
            self.requests_per_minute = 20;
        }
        if self.checkin_offsets.is_empty() {
            warn!("Empty check-in schedule, falling back to blank dates");
            self.checkin_offsets = vec![PassValue::ProviderDefault];
        }
        if self.stay_nights.is_empty() {
            warn!(
                "Empty stay-length schedule, falling back to {} nights",
                self.default_stay_nights
            );
            self.stay_nights = vec![PassValue::Explicit(self.default_stay_nights)];
        }
        if self.zoom_levels.is_empty() {
            warn!("Empty zoom schedule, falling back to zoom 15");
            self.zoom_levels = vec![15];
        }
        self
    }

    /// Check-in offset for a pass; `None` means the pass runs with blank
    /// dates.
    pub fn checkin_offset_for_pass(&self, pass_id: usize) -> Option<i64> {
        match cycle(&self.checkin_offsets, pass_id) {
            Some(PassValue::Explicit(days)) => Some(*days),
            Some(PassValue::ProviderDefault) | None => None,
        }
    }

    /// Stay length in nights for a pass.
    pub fn stay_nights_for_pass(&self, pass_id: usize) -> u32 {
        match cycle(&self.stay_nights, pass_id) {
            Some(PassValue::Explicit(nights)) => *nights,
            Some(PassValue::ProviderDefault) | None => self.default_stay_nights,
        }
    }

    /// Zoom level for a pass.
    pub fn zoom_for_pass(&self, pass_id: usize) -> u32 {
        cycle(&self.zoom_levels, pass_id).copied().unwrap_or(15)
    }

    /// Check-in/check-out date strings for a pass. Blank-date passes return
    /// a pair of empty strings, which the provider treats as "no filter".
    pub fn dates_for_pass(&self, pass_id: usize) -> (String, String) {
        let Some(offset) = self.checkin_offset_for_pass(pass_id) else {
            return (String::new(), String::new());
        };

        let today = Utc::now().date_naive();
        let check_in = today + chrono::Duration::days(offset);
        let check_out = check_in + chrono::Duration::days(self.stay_nights_for_pass(pass_id) as i64);

        (
            check_in.format("%Y-%m-%d").to_string(),
            check_out.format("%Y-%m-%d").to_string(),
        )
    }

    /// Minimum interval between any two requests in the campaign.
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.requests_per_minute as f64)
    }
}
