use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel grid assignment for listings whose coordinate lies outside every
/// campaign grid cell.
pub const OUTSIDE_GRID: i64 = -1;

/// A listing surfaced by discovery, created exactly once at first sighting
/// and keyed by its external identifier for the rest of the campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredListing {
    /// External listing identifier
    pub listing_id: i64,
    /// Latitude as reported by the provider
    pub latitude: f64,
    /// Longitude as reported by the provider
    pub longitude: f64,
    /// Grid the listing was surfaced from
    pub grid_id_source: Option<i64>,
    /// Grid assigned by coordinate verification; `None` until verification
    /// runs, [`OUTSIDE_GRID`] if no grid contains the coordinate
    pub grid_id_assigned: Option<i64>,
    /// Identity of the quadtree cell whose search surfaced the listing
    pub cell_id: String,
    /// Discovery pass the listing was first seen in
    pub pass_id: usize,
    /// When the listing was first seen
    pub discovered_at: DateTime<Utc>,
    /// Full raw provider payload, preserved for downstream enrichment
    pub raw: Value,
}

/// Statistics for a single executed search call.
///
/// One record per executor invocation, success or exhausted-retry failure
/// (the latter recorded with zero results).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCallRecord {
    /// Identity of the searched cell
    pub cell_id: String,
    /// Grid the searched cell is rooted at
    pub grid_id: Option<i64>,
    /// Discovery pass index
    pub pass_id: usize,
    /// Number of results returned (0 after exhausted retries)
    pub results_count: usize,
    /// Whether the caller subdivided this cell afterwards
    pub subdivided: bool,
    /// Retry attempts consumed beyond the first attempt
    pub retry_count: u32,
    /// Wall-clock duration of the call including retries
    pub duration_seconds: f64,
    /// When the call completed
    pub timestamp: DateTime<Utc>,
}

/// Campaign-fatal error conditions.
///
/// Transient provider failures, cache I/O problems, and malformed result
/// records are all handled locally inside the engine and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Filesystem failure creating or writing campaign directories/outputs
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output record could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The campaign was started with no grid cells to process
    #[error("No grid cells to process")]
    EmptyGrid,
}
