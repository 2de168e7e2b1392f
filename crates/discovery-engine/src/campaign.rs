use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use listing_search::SearchProvider;
use tracing::{error, info};
use uuid::Uuid;

use crate::cell::GridCell;
use crate::config::DiscoveryConfig;
use crate::engine::DiscoveryEngine;
use crate::stats::StatsReport;
use crate::types::{DiscoveredListing, DiscoveryError};
use crate::verifier::VerificationSummary;

/// Driver-level options for one campaign run.
#[derive(Debug, Clone)]
pub struct CampaignOptions {
    /// Directory combined and segmented outputs are written under
    pub output_dir: PathBuf,
    /// Persist each grid's segmented output as soon as the grid completes
    pub save_per_grid: bool,
    /// Grid identifiers to omit from this run
    pub skip_grids: Vec<i64>,
}

/// Result of a completed campaign.
pub struct CampaignOutcome {
    /// Campaign run identifier stamped into the combined output
    pub run_id: Uuid,
    /// The full discovered-listings collection
    pub listings: HashMap<i64, DiscoveredListing>,
    /// Campaign statistics
    pub report: StatsReport,
    /// Coordinate-verification counts
    pub verification: VerificationSummary,
    /// Grids actually processed
    pub grids_processed: usize,
    /// Grids omitted via the skip list
    pub grids_skipped: usize,
}

/// Run a full discovery campaign over a set of named grid cells.
///
/// Per-cell and per-call failures are handled inside the engine; the only
/// fatal conditions here are an empty grid list and output/cache directory
/// setup failures. Combined output and the stats report are written under
/// `options.output_dir` when everything else has completed.
pub async fn run_campaign(
    provider: Arc<dyn SearchProvider>,
    grids: &[GridCell],
    config: DiscoveryConfig,
    options: &CampaignOptions,
) -> Result<CampaignOutcome, DiscoveryError> {
    if grids.is_empty() {
        return Err(DiscoveryError::EmptyGrid);
    }

    fs::create_dir_all(&options.output_dir)?;

    let run_id = Uuid::new_v4();
    let mut engine = DiscoveryEngine::new(provider, config)?;

    info!("Starting campaign {} over {} grids", run_id, grids.len());
    if !options.skip_grids.is_empty() {
        info!(
            "Skipping {} grids: {:?}",
            options.skip_grids.len(),
            options.skip_grids
        );
    }

    let mut grids_processed = 0;
    let mut grids_skipped = 0;

    for grid in grids {
        if options.skip_grids.contains(&grid.grid_id) {
            info!("Skipping grid {} (in skip list)", grid.grid_id);
            grids_skipped += 1;
            continue;
        }

        info!("Processing grid {} of {}", grid.grid_id, grids.len());
        engine.discover_grid(&grid.to_cell()).await;

        if options.save_per_grid {
            let segmented_dir = options.output_dir.join("segmented");
            if let Err(e) = engine.save_grid_results(grid.grid_id, &segmented_dir) {
                // Lost segmented write; the combined output still covers it.
                error!("Failed to save grid {} results: {}", grid.grid_id, e);
            }
        }

        grids_processed += 1;
    }

    let verification = engine.verify_coordinates(grids);
    let report = engine.generate_stats_report().await;

    engine.save_discoveries(run_id, &options.output_dir.join("discovered_listings.json"))?;
    fs::write(
        options.output_dir.join("discovery_stats.json"),
        serde_json::to_string_pretty(&report)?,
    )?;

    report.log_summary();
    info!(
        "Campaign {} complete: {} grids processed, {} skipped",
        run_id, grids_processed, grids_skipped
    );

    Ok(CampaignOutcome {
        run_id,
        listings: engine.into_listings(),
        report,
        verification,
        grids_processed,
        grids_skipped,
    })
}
