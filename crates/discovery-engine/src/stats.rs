use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::info;

use crate::types::{DiscoveredListing, OUTSIDE_GRID, SearchCallRecord};

/// Campaign-level totals.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    /// Unique listings discovered across the whole campaign
    pub total_unique_listings: usize,
    /// Search calls executed, exhausted failures included
    pub total_searches: usize,
    /// Requests issued against the provider, retries included
    pub total_requests: u64,
}

/// Subdivision activity.
#[derive(Debug, Clone, Serialize)]
pub struct SubdivisionStats {
    /// Calls whose cell was subdivided afterwards
    pub total_subdivisions: usize,
}

/// Retry activity, distinguishing "legitimately empty" from "failed".
#[derive(Debug, Clone, Serialize)]
pub struct RetryStats {
    /// Retry attempts consumed across all calls
    pub total_retries: u64,
    /// Calls that exhausted retries: zero results and a nonzero retry count
    pub failed_searches: usize,
}

/// Per-grid listing breakdown.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GridBreakdown {
    /// Unique listings attributed to the grid
    pub unique_listings: usize,
    /// How many of those were first seen in each pass
    pub listings_by_pass: BTreeMap<usize, usize>,
}

/// Read-only reduction over the campaign's listings and call records.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    /// Campaign totals
    pub summary: StatsSummary,
    /// Subdivision activity
    pub subdivision: SubdivisionStats,
    /// Retry activity
    pub retries: RetryStats,
    /// Breakdown keyed by grid id; listings outside every grid appear under
    /// the [`OUTSIDE_GRID`] sentinel key, never under a real grid
    pub by_grid: BTreeMap<i64, GridBreakdown>,
}

/// Build the campaign statistics report. Pure reduction, no side effects.
pub fn build_report(
    listings: &HashMap<i64, DiscoveredListing>,
    records: &[SearchCallRecord],
    total_requests: u64,
) -> StatsReport {
    let mut by_grid: BTreeMap<i64, GridBreakdown> = BTreeMap::new();

    for listing in listings.values() {
        let grid_id = listing
            .grid_id_assigned
            .or(listing.grid_id_source)
            .unwrap_or(OUTSIDE_GRID);

        let breakdown = by_grid.entry(grid_id).or_default();
        breakdown.unique_listings += 1;
        *breakdown.listings_by_pass.entry(listing.pass_id).or_insert(0) += 1;
    }

    StatsReport {
        summary: StatsSummary {
            total_unique_listings: listings.len(),
            total_searches: records.len(),
            total_requests,
        },
        subdivision: SubdivisionStats {
            total_subdivisions: records.iter().filter(|r| r.subdivided).count(),
        },
        retries: RetryStats {
            total_retries: records.iter().map(|r| r.retry_count as u64).sum(),
            failed_searches: records
                .iter()
                .filter(|r| r.results_count == 0 && r.retry_count > 0)
                .count(),
        },
        by_grid,
    }
}

impl StatsReport {
    /// Log the human-readable campaign summary.
    pub fn log_summary(&self) {
        info!("===== Discovery statistics =====");
        info!(
            "Total unique listings discovered: {}",
            self.summary.total_unique_listings
        );
        info!("Total search calls: {}", self.summary.total_searches);
        info!("Total requests issued: {}", self.summary.total_requests);
        info!(
            "Total subdivisions triggered: {}",
            self.subdivision.total_subdivisions
        );
        info!("Total retries: {}", self.retries.total_retries);
        info!("Failed searches: {}", self.retries.failed_searches);
        for (grid_id, breakdown) in &self.by_grid {
            info!("Grid {}: {} listings", grid_id, breakdown.unique_listings);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn listing(
        id: i64,
        pass_id: usize,
        source: Option<i64>,
        assigned: Option<i64>,
    ) -> (i64, DiscoveredListing) {
        (
            id,
            DiscoveredListing {
                listing_id: id,
                latitude: 41.5,
                longitude: -87.5,
                grid_id_source: source,
                grid_id_assigned: assigned,
                cell_id: "cell".to_string(),
                pass_id,
                discovered_at: Utc::now(),
                raw: json!({}),
            },
        )
    }

    fn call(results_count: usize, subdivided: bool, retry_count: u32) -> SearchCallRecord {
        SearchCallRecord {
            cell_id: "cell".to_string(),
            grid_id: Some(1),
            pass_id: 0,
            results_count,
            subdivided,
            retry_count,
            duration_seconds: 0.1,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_totals_and_failed_search_discrimination() {
        let listings = HashMap::from([listing(1, 0, Some(1), Some(1))]);
        let records = vec![
            call(5, true, 0),
            // Legitimately empty: zero results, no retries.
            call(0, false, 0),
            // Failed: exhausted retries.
            call(0, false, 3),
            call(2, false, 1),
        ];

        let report = build_report(&listings, &records, 9);

        assert_eq!(report.summary.total_unique_listings, 1);
        assert_eq!(report.summary.total_searches, 4);
        assert_eq!(report.summary.total_requests, 9);
        assert_eq!(report.subdivision.total_subdivisions, 1);
        assert_eq!(report.retries.total_retries, 4);
        assert_eq!(report.retries.failed_searches, 1);
    }

    #[test]
    fn test_per_grid_breakdown_across_passes() {
        let listings = HashMap::from([
            listing(1, 0, Some(1), Some(1)),
            listing(2, 0, Some(1), Some(1)),
            listing(3, 1, Some(1), Some(1)),
            listing(4, 0, Some(1), Some(2)),
        ]);

        let report = build_report(&listings, &[], 0);

        let grid1 = &report.by_grid[&1];
        assert_eq!(grid1.unique_listings, 3);
        assert_eq!(grid1.listings_by_pass[&0], 2);
        assert_eq!(grid1.listings_by_pass[&1], 1);
        assert_eq!(report.by_grid[&2].unique_listings, 1);
    }

    #[test]
    fn test_outside_listings_bucket_under_sentinel_only() {
        let listings = HashMap::from([
            listing(1, 0, Some(1), Some(OUTSIDE_GRID)),
            listing(2, 0, Some(1), Some(1)),
        ]);

        let report = build_report(&listings, &[], 0);

        assert_eq!(report.by_grid[&OUTSIDE_GRID].unique_listings, 1);
        assert_eq!(report.by_grid[&1].unique_listings, 1);
    }

    #[test]
    fn test_unverified_listing_falls_back_to_source_grid() {
        let listings = HashMap::from([listing(1, 0, Some(4), None)]);

        let report = build_report(&listings, &[], 0);

        assert_eq!(report.by_grid[&4].unique_listings, 1);
    }
}
