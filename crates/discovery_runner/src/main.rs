//! Entry point for running a discovery campaign from the command line.
//! Loads the grid-cell file and environment configuration, then drives the
//! engine over every grid and persists combined and segmented outputs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use discovery_engine::{CampaignOptions, DiscoveryConfig, GridCell, run_campaign};
use listing_search::HttpSearchClient;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Load the campaign grid: a JSON array of named grid cells. An unreadable
/// or empty file aborts the campaign with a clear diagnostic.
fn load_grid_file(path: &str) -> anyhow::Result<Vec<GridCell>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read grid file {}", path))?;
    let grids: Vec<GridCell> = serde_json::from_str(&data)
        .with_context(|| format!("Grid file {} is not a valid grid-cell list", path))?;
    anyhow::ensure!(!grids.is_empty(), "Grid file {} contains no cells", path);
    Ok(grids)
}

fn config_from_env() -> DiscoveryConfig {
    let mut config = DiscoveryConfig::default();

    if let Ok(dir) = std::env::var("CACHE_DIR") {
        config.cache_dir = PathBuf::from(dir);
    }
    if let Ok(v) = std::env::var("ENABLE_CACHE") {
        config.enable_cache = v != "false" && v != "0";
    }
    // Malformed numeric overrides fall back to the defaults rather than
    // failing the run.
    if let Some(rpm) = std::env::var("REQUESTS_PER_MINUTE")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.requests_per_minute = rpm;
    } else if std::env::var("REQUESTS_PER_MINUTE").is_ok() {
        log::warn!("Ignoring malformed REQUESTS_PER_MINUTE");
    }
    if let Some(passes) = std::env::var("NUM_PASSES").ok().and_then(|v| v.parse().ok()) {
        config.num_passes = passes;
    }

    config
}

fn skip_grids_from_env() -> Vec<i64> {
    std::env::var("SKIP_GRIDS")
        .map(|v| {
            v.split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("Starting listing discovery campaign...");

    let grid_file = env_or("GRID_FILE", "data/grid_cells.json");
    let output_dir = env_or("OUTPUT_DIR", "data/output");
    let base_url = env_or("PROVIDER_BASE_URL", "https://www.airbnb.com");

    let grids = match load_grid_file(&grid_file) {
        Ok(grids) => {
            log::info!("Loaded {} grid cells from {}", grids.len(), grid_file);
            grids
        }
        Err(e) => {
            log::error!("Cannot enumerate grid cells: {:#}", e);
            std::process::exit(1);
        }
    };

    let provider = Arc::new(
        HttpSearchClient::new(&base_url).context("Failed to build search client")?,
    );

    let options = CampaignOptions {
        output_dir: PathBuf::from(output_dir),
        save_per_grid: true,
        skip_grids: skip_grids_from_env(),
    };

    match run_campaign(provider, &grids, config_from_env(), &options).await {
        Ok(outcome) => {
            log::info!(
                "Discovery complete: {} unique listings across {} grids ({} skipped), run {}",
                outcome.listings.len(),
                outcome.grids_processed,
                outcome.grids_skipped,
                outcome.run_id
            );
            log::info!(
                "Verification: {} in-grid, {} reassigned, {} outside-grid",
                outcome.verification.verified,
                outcome.verification.reassigned,
                outcome.verification.outside
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Campaign failed: {}", e);
            std::process::exit(1);
        }
    }
}
