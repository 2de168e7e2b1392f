use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in latitude/longitude space used as a query
/// unit.
///
/// Callers supply NE strictly north/east of SW; malformed input is not
/// validated here and simply yields a degenerate zero-size cell that the
/// minimum-size check refuses to subdivide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// North-east corner latitude
    pub ne_lat: f64,
    /// North-east corner longitude
    pub ne_long: f64,
    /// South-west corner latitude
    pub sw_lat: f64,
    /// South-west corner longitude
    pub sw_long: f64,
    /// Campaign grid this cell belongs to, if any
    pub grid_id: Option<i64>,
    /// Subdivision depth, 0 for a root cell
    pub depth: u32,
    /// Identity of the cell this one was subdivided from
    pub parent_id: Option<String>,
}

impl Cell {
    /// Create a root cell with no grid assignment.
    pub fn new(ne_lat: f64, ne_long: f64, sw_lat: f64, sw_long: f64) -> Self {
        Self {
            ne_lat,
            ne_long,
            sw_lat,
            sw_long,
            grid_id: None,
            depth: 0,
            parent_id: None,
        }
    }

    /// Create a root cell assigned to a campaign grid.
    pub fn with_grid(ne_lat: f64, ne_long: f64, sw_lat: f64, sw_long: f64, grid_id: i64) -> Self {
        Self {
            grid_id: Some(grid_id),
            ..Self::new(ne_lat, ne_long, sw_lat, sw_long)
        }
    }

    /// Deterministic identity, a pure function of the four coordinates.
    ///
    /// Fixed 6-decimal formatting guarantees that structurally equal cells
    /// (including children produced independently) share a cache key.
    pub fn identity(&self) -> String {
        format!(
            "{:.6}_{:.6}_{:.6}_{:.6}",
            self.sw_lat, self.sw_long, self.ne_lat, self.ne_long
        )
    }

    /// Center point as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.ne_lat + self.sw_lat) / 2.0,
            (self.ne_long + self.sw_long) / 2.0,
        )
    }

    /// Max dimension in degrees.
    pub fn size(&self) -> f64 {
        let lat_span = (self.ne_lat - self.sw_lat).abs();
        let lon_span = (self.ne_long - self.sw_long).abs();
        lat_span.max(lon_span)
    }

    /// Subdivide into the four quadrant children (NE, NW, SE, SW), each one
    /// depth deeper, inheriting the grid assignment and back-referencing this
    /// cell's identity. Pure, no side effects.
    pub fn subdivide(&self) -> [Cell; 4] {
        let (center_lat, center_lon) = self.center();
        let child = |ne_lat: f64, ne_long: f64, sw_lat: f64, sw_long: f64| Cell {
            ne_lat,
            ne_long,
            sw_lat,
            sw_long,
            grid_id: self.grid_id,
            depth: self.depth + 1,
            parent_id: Some(self.identity()),
        };

        [
            // NE quadrant
            child(self.ne_lat, self.ne_long, center_lat, center_lon),
            // NW quadrant
            child(self.ne_lat, center_lon, center_lat, self.sw_long),
            // SE quadrant
            child(center_lat, self.ne_long, self.sw_lat, center_lon),
            // SW quadrant
            child(center_lat, center_lon, self.sw_lat, self.sw_long),
        ]
    }
}

/// A named campaign-level grid cell, supplied by the caller as part of the
/// region partition. Distinct from the quadtree cells the engine generates
/// internally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// Campaign-assigned grid identifier
    pub grid_id: i64,
    /// North-east corner latitude
    pub ne_lat: f64,
    /// North-east corner longitude
    pub ne_long: f64,
    /// South-west corner latitude
    pub sw_lat: f64,
    /// South-west corner longitude
    pub sw_long: f64,
}

impl GridCell {
    /// Whether this grid cell geometrically contains the coordinate.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.sw_lat <= lat && lat <= self.ne_lat && self.sw_long <= lon && lon <= self.ne_long
    }

    /// The root quadtree cell covering this grid cell.
    pub fn to_cell(&self) -> Cell {
        Cell::with_grid(
            self.ne_lat,
            self.ne_long,
            self.sw_lat,
            self.sw_long,
            self.grid_id,
        )
    }
}
