use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::DiscoveryConfig;
use crate::engine::DiscoveryEngine;
use crate::types::{DiscoveredListing, DiscoveryError, SearchCallRecord};

/// Combined campaign output: every discovered listing with its raw payload,
/// plus the configuration the campaign ran with.
#[derive(Debug, Serialize)]
pub struct CombinedDiscoveries<'a> {
    /// Campaign run identifier
    pub run_id: Uuid,
    /// Unique listing count
    pub total_unique_listings: usize,
    /// When the output was written
    pub discovery_timestamp: DateTime<Utc>,
    /// Configuration the campaign ran with
    pub config: &'a DiscoveryConfig,
    /// Listings keyed by external identifier
    pub listings: &'a HashMap<i64, DiscoveredListing>,
}

/// Per-grid segmented listings output.
#[derive(Debug, Serialize)]
pub struct SegmentedListings<'a> {
    /// Grid the segment covers
    pub grid_id: i64,
    /// Listings in the segment
    pub total_listings: usize,
    /// When the output was written
    pub discovery_timestamp: DateTime<Utc>,
    /// Listings whose source or assigned grid matches
    pub listings: HashMap<i64, &'a DiscoveredListing>,
}

/// Per-grid segmented call-record output.
#[derive(Debug, Serialize)]
pub struct SegmentedStats<'a> {
    /// Grid the segment covers
    pub grid_id: i64,
    /// Call records rooted at the grid
    pub total_searches: usize,
    /// Listings attributed to the grid
    pub total_listings: usize,
    /// When the output was written
    pub discovery_timestamp: DateTime<Utc>,
    /// The call records themselves
    pub stats: Vec<&'a SearchCallRecord>,
}

impl DiscoveryEngine {
    /// Write the combined campaign output to `path`.
    pub fn save_discoveries(&self, run_id: Uuid, path: &Path) -> Result<(), DiscoveryError> {
        info!(
            "Saving {} listings to {}",
            self.listings.len(),
            path.display()
        );

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let output = CombinedDiscoveries {
            run_id,
            total_unique_listings: self.listings.len(),
            discovery_timestamp: Utc::now(),
            config: &self.config,
            listings: &self.listings,
        };

        fs::write(path, serde_json::to_string_pretty(&output)?)?;
        Ok(())
    }

    /// Write one grid's segmented outputs (listings + call records) into
    /// `dir`, with timestamped filenames so incremental saves never clobber
    /// earlier runs.
    pub fn save_grid_results(&self, grid_id: i64, dir: &Path) -> Result<(), DiscoveryError> {
        fs::create_dir_all(dir)?;

        let grid_listings: HashMap<i64, &DiscoveredListing> = self
            .listings
            .iter()
            .filter(|(_, l)| {
                l.grid_id_source == Some(grid_id) || l.grid_id_assigned == Some(grid_id)
            })
            .map(|(id, l)| (*id, l))
            .collect();

        let grid_records: Vec<&SearchCallRecord> = self
            .call_records
            .iter()
            .filter(|r| r.grid_id == Some(grid_id))
            .collect();

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");

        let listings_out = SegmentedListings {
            grid_id,
            total_listings: grid_listings.len(),
            discovery_timestamp: Utc::now(),
            listings: grid_listings,
        };
        let listings_path = dir.join(format!("discovered_listings_grid_{}_{}.json", grid_id, stamp));
        fs::write(&listings_path, serde_json::to_string_pretty(&listings_out)?)?;

        let stats_out = SegmentedStats {
            grid_id,
            total_searches: grid_records.len(),
            total_listings: listings_out.total_listings,
            discovery_timestamp: Utc::now(),
            stats: grid_records,
        };
        let stats_path = dir.join(format!("discovery_stats_grid_{}_{}.json", grid_id, stamp));
        fs::write(&stats_path, serde_json::to_string_pretty(&stats_out)?)?;

        info!(
            "Saved grid {} results: {} listings, {} call records",
            grid_id, listings_out.total_listings, stats_out.total_searches
        );

        Ok(())
    }
}
