use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cell::Cell;

/// Persisted record for one completed (cell, pass) search subtree.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Grid the cell is rooted at
    pub grid_id: Option<i64>,
    /// Discovery pass the entry covers
    pub pass_id: usize,
    /// The searched cell, coordinates and depth included
    pub cell: Cell,
    /// Listing identifiers discovered under the cell in this pass
    pub listing_ids: Vec<i64>,
    /// Number of identifiers
    pub count: usize,
    /// When the entry was written
    pub timestamp: DateTime<Utc>,
}

/// File-backed resumption cache, one JSON file per (cell, pass) key.
///
/// Keys derive from the cell's deterministic identity, so structurally equal
/// cells hit the same entry no matter how they were produced. Reads and
/// writes are best-effort: an absent or unreadable entry is a miss and a
/// failed write is a lost write, both logged and never fatal.
pub struct DiscoveryCache {
    dir: PathBuf,
}

impl DiscoveryCache {
    /// Open the cache, creating its directory. Directory creation failure is
    /// the one fatal cache condition: resumability is silently lost otherwise.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn entry_path(&self, cell: &Cell, pass_id: usize) -> PathBuf {
        self.dir
            .join(format!("{}_pass_{}.json", cell.identity(), pass_id))
    }

    /// Load the identifier set for a (cell, pass) key, `None` on a miss.
    pub fn load(&self, cell: &Cell, pass_id: usize) -> Option<HashSet<i64>> {
        let path = self.entry_path(cell, pass_id);
        if !path.exists() {
            return None;
        }

        match read_entry(&path) {
            Ok(entry) => {
                debug!(
                    "Cache hit for cell {} pass {}: {} ids",
                    cell.identity(),
                    pass_id,
                    entry.listing_ids.len()
                );
                Some(entry.listing_ids.into_iter().collect())
            }
            Err(e) => {
                warn!("Failed to load cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Persist the identifier set for a (cell, pass) key. Best-effort.
    pub fn store(&self, cell: &Cell, pass_id: usize, listing_ids: &HashSet<i64>) {
        let mut ids: Vec<i64> = listing_ids.iter().copied().collect();
        ids.sort_unstable();

        let entry = CacheEntry {
            grid_id: cell.grid_id,
            pass_id,
            cell: cell.clone(),
            count: ids.len(),
            listing_ids: ids,
            timestamp: Utc::now(),
        };

        let path = self.entry_path(cell, pass_id);
        if let Err(e) = write_entry(&path, &entry) {
            warn!("Failed to save cache entry {}: {}", path.display(), e);
        }
    }
}

fn read_entry(path: &Path) -> Result<CacheEntry, Box<dyn std::error::Error>> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn write_entry(path: &Path, entry: &CacheEntry) -> Result<(), Box<dyn std::error::Error>> {
    let data = serde_json::to_string_pretty(entry)?;
    fs::write(path, data)?;
    Ok(())
}
