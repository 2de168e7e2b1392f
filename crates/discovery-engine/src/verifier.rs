use std::collections::HashMap;

use tracing::{debug, info};

use crate::cell::GridCell;
use crate::types::{DiscoveredListing, OUTSIDE_GRID};

/// Counts from one verification sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationSummary {
    /// Listings contained by some grid cell
    pub verified: usize,
    /// Listings whose containing grid differs from their source grid
    pub reassigned: usize,
    /// Listings outside every grid cell, tagged with [`OUTSIDE_GRID`]
    pub outside: usize,
}

/// Grid cell containing the coordinate, if any.
///
/// When grids overlap, the first containment match in the caller-supplied
/// iteration order wins. That tie-break is a deliberate, documented policy,
/// not an error.
pub fn grid_for_coordinate(lat: f64, lon: f64, grids: &[GridCell]) -> Option<i64> {
    grids.iter().find(|g| g.contains(lat, lon)).map(|g| g.grid_id)
}

/// Reassign every discovered listing to the grid cell that geometrically
/// contains its reported coordinate.
///
/// Only `grid_id_assigned` is touched, in place; the source grid and every
/// other field stay as discovered. No listing is ever discarded — a
/// coordinate outside all grids gets the [`OUTSIDE_GRID`] sentinel.
pub fn verify_coordinates(
    listings: &mut HashMap<i64, DiscoveredListing>,
    grids: &[GridCell],
) -> VerificationSummary {
    info!(
        "Verifying coordinates for {} discovered listings",
        listings.len()
    );

    let mut summary = VerificationSummary {
        verified: 0,
        reassigned: 0,
        outside: 0,
    };

    for (listing_id, listing) in listings.iter_mut() {
        match grid_for_coordinate(listing.latitude, listing.longitude, grids) {
            Some(grid_id) => {
                listing.grid_id_assigned = Some(grid_id);
                summary.verified += 1;

                if listing.grid_id_source != Some(grid_id) {
                    summary.reassigned += 1;
                    debug!(
                        "Listing {} reassigned: grid {:?} -> {}",
                        listing_id, listing.grid_id_source, grid_id
                    );
                }
            }
            None => {
                listing.grid_id_assigned = Some(OUTSIDE_GRID);
                summary.outside += 1;
                debug!(
                    "Listing {} outside all grids: ({}, {})",
                    listing_id, listing.latitude, listing.longitude
                );
            }
        }
    }

    info!(
        "Coordinate verification complete: {} in-grid, {} reassigned, {} outside-grid",
        summary.verified, summary.reassigned, summary.outside
    );

    summary
}
