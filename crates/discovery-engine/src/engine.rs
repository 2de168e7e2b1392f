use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use listing_search::{SearchProvider, SearchRecord};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cache::DiscoveryCache;
use crate::cell::{Cell, GridCell};
use crate::config::DiscoveryConfig;
use crate::executor::RateGate;
use crate::stats::StatsReport;
use crate::types::{DiscoveredListing, DiscoveryError, SearchCallRecord};
use crate::verifier::{self, VerificationSummary};

/// Campaign-scoped discovery engine.
///
/// Owns all mutable campaign state: the deduplicated listings map, the
/// append-only call-record list, the shared rate gate, and the injected
/// random source. One engine instance spans one campaign; the driver feeds
/// it root cells and reads the accumulated results afterwards.
pub struct DiscoveryEngine {
    pub(crate) provider: Arc<dyn SearchProvider>,
    pub(crate) config: DiscoveryConfig,
    pub(crate) cache: Option<DiscoveryCache>,
    pub(crate) listings: HashMap<i64, DiscoveredListing>,
    pub(crate) call_records: Vec<SearchCallRecord>,
    pub(crate) rate: Arc<Mutex<RateGate>>,
    pub(crate) rng: StdRng,
}

impl DiscoveryEngine {
    /// Create an engine for one campaign. The configuration is validated
    /// (defaults filled) here; cache-directory creation failure is the one
    /// fatal setup condition.
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        config: DiscoveryConfig,
    ) -> Result<Self, DiscoveryError> {
        let config = config.validated();

        let cache = if config.enable_cache {
            Some(DiscoveryCache::open(&config.cache_dir)?)
        } else {
            None
        };

        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        if config.rotate_identities {
            info!(
                "Identity rotation enabled with {} identities",
                config.identity_pool.len()
            );
        }

        Ok(Self {
            provider,
            config,
            cache,
            listings: HashMap::new(),
            call_records: Vec::new(),
            rate: Arc::new(Mutex::new(RateGate::new())),
            rng,
        })
    }

    /// The validated configuration in effect for this campaign.
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// All listings discovered so far, keyed by external identifier.
    pub fn listings(&self) -> &HashMap<i64, DiscoveredListing> {
        &self.listings
    }

    /// Consume the engine, yielding the discovered-listings collection.
    pub fn into_listings(self) -> HashMap<i64, DiscoveredListing> {
        self.listings
    }

    /// Every search call executed so far, in execution order.
    pub fn call_records(&self) -> &[SearchCallRecord] {
        &self.call_records
    }

    /// Total requests issued against the provider, retries included.
    pub async fn request_count(&self) -> u64 {
        self.rate.lock().await.request_count
    }

    /// Discover all listings in a root cell using multi-pass search with
    /// adaptive subdivision. Returns the union of identifiers found across
    /// all passes.
    ///
    /// With caching enabled, a pass whose cache entry already exists is
    /// loaded and skipped; re-running such a pass changes neither the
    /// listings collection nor the call-record list.
    pub async fn discover_grid(&mut self, root: &Cell) -> HashSet<i64> {
        info!(
            "Starting discovery for grid {:?} ({} passes)",
            root.grid_id, self.config.num_passes
        );

        let mut all_ids: HashSet<i64> = HashSet::new();

        for pass_id in 0..self.config.num_passes {
            info!("  Pass {}/{}", pass_id + 1, self.config.num_passes);

            if let Some(cache) = &self.cache {
                if let Some(cached) = cache.load(root, pass_id) {
                    info!("    Loaded {} ids from cache", cached.len());
                    all_ids.extend(cached);
                    continue;
                }
            }

            let pass_ids = self.search_cell(root.clone(), pass_id).await;

            // New-this-pass must be computed before the union is updated.
            let new_this_pass = pass_ids.difference(&all_ids).count();
            all_ids.extend(pass_ids.iter().copied());

            info!(
                "    Found {} listings (+{} new this pass)",
                pass_ids.len(),
                new_this_pass
            );

            if let Some(cache) = &self.cache {
                cache.store(root, pass_id, &pass_ids);
            }
        }

        info!(
            "Completed grid {:?}: {} unique listings",
            root.grid_id,
            all_ids.len()
        );

        all_ids
    }

    /// One discovery pass over a cell and, where truncation is suspected, its
    /// quadtree descendants. Runs an explicit worklist rather than native
    /// recursion; depth lives on the cell itself.
    async fn search_cell(&mut self, root: Cell, pass_id: usize) -> HashSet<i64> {
        let mut found: HashSet<i64> = HashSet::new();
        let mut worklist = vec![root];

        while let Some(cell) = worklist.pop() {
            let (results, mut record) = self.search_with_retry(&cell, pass_id).await;
            self.collect_results(&cell, pass_id, &results, &mut found);

            if self.should_subdivide(&cell, results.len()) {
                info!(
                    "Subdividing cell {} into 4 quadrants (depth {} -> {}) at {} results",
                    cell.identity(),
                    cell.depth,
                    cell.depth + 1,
                    results.len()
                );
                record.subdivided = true;
                worklist.extend(cell.subdivide());
            }

            self.call_records.push(record);
        }

        found
    }

    /// Register result records, inserting first-seen listings. Records
    /// without an identifier are not discoverable and are dropped silently.
    fn collect_results(
        &mut self,
        cell: &Cell,
        pass_id: usize,
        results: &[SearchRecord],
        found: &mut HashSet<i64>,
    ) {
        for result in results {
            let Some(listing_id) = result.listing_id else {
                continue;
            };
            found.insert(listing_id);

            self.listings
                .entry(listing_id)
                .or_insert_with(|| DiscoveredListing {
                    listing_id,
                    latitude: result.latitude,
                    longitude: result.longitude,
                    grid_id_source: cell.grid_id,
                    grid_id_assigned: None,
                    cell_id: cell.identity(),
                    pass_id,
                    discovered_at: Utc::now(),
                    raw: result.raw.clone(),
                });
        }
    }

    /// A cell is subdivided when its result count suggests provider-side
    /// truncation, unless it is already too small or too deep.
    fn should_subdivide(&self, cell: &Cell, results_count: usize) -> bool {
        if cell.depth >= self.config.max_subdivision_depth {
            debug!("Max depth reached for {}", cell.identity());
            return false;
        }
        if cell.size() < self.config.min_cell_size_degrees {
            debug!("Min size reached for {}", cell.identity());
            return false;
        }
        results_count >= self.config.max_results_before_subdivide
    }

    /// Reassign every discovered listing to the grid cell that geometrically
    /// contains its coordinate. See [`verifier::verify_coordinates`].
    pub fn verify_coordinates(&mut self, grids: &[GridCell]) -> VerificationSummary {
        verifier::verify_coordinates(&mut self.listings, grids)
    }

    /// Reduce the campaign's listings and call records to a statistics
    /// report.
    pub async fn generate_stats_report(&self) -> StatsReport {
        let total_requests = self.request_count().await;
        crate::stats::build_report(&self.listings, &self.call_records, total_requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ScriptedProvider, raw_record, record, records_for_query, test_config};
    use listing_search::SearchError;
    use std::path::PathBuf;

    fn root() -> Cell {
        Cell::with_grid(42.0, -87.0, 41.0, -88.0, 1)
    }

    #[tokio::test]
    async fn test_truncated_cell_subdivides_one_level() {
        // Root (size 1.0) returns the subdivide threshold; its four children
        // (size 0.5) return a sparse count and stop.
        let provider = ScriptedProvider::new(|query, call| {
            let size = (query.ne_lat - query.sw_lat).max(query.ne_long - query.sw_long);
            if size > 0.6 {
                Ok(records_for_query(call, 4))
            } else {
                Ok(records_for_query(call, 2))
            }
        });
        let config = DiscoveryConfig {
            max_results_before_subdivide: 4,
            num_passes: 1,
            ..test_config()
        };
        let mut engine = DiscoveryEngine::new(provider.clone(), config).unwrap();

        let ids = engine.discover_grid(&root()).await;

        // One root call plus four child calls, no deeper.
        assert_eq!(provider.call_count(), 5);
        assert_eq!(ids.len(), 4 + 4 * 2);

        let records = engine.call_records();
        assert_eq!(records.len(), 5);
        assert!(records[0].subdivided);
        assert_eq!(records[0].results_count, 4);
        for child in &records[1..] {
            assert!(!child.subdivided);
            assert_eq!(child.results_count, 2);
        }
    }

    #[tokio::test]
    async fn test_small_cell_never_subdivides() {
        let provider = ScriptedProvider::new(|_, call| Ok(records_for_query(call, 10)));
        let config = DiscoveryConfig {
            max_results_before_subdivide: 10,
            min_cell_size_degrees: 2.0,
            num_passes: 1,
            ..test_config()
        };
        let mut engine = DiscoveryEngine::new(provider.clone(), config).unwrap();

        engine.discover_grid(&root()).await;

        assert_eq!(provider.call_count(), 1);
        assert!(!engine.call_records()[0].subdivided);
    }

    #[tokio::test]
    async fn test_max_depth_bounds_subdivision() {
        // Every cell reports the threshold, so only the depth limit stops the
        // drill-down: 1 root + 4 + 16 calls at max depth 2.
        let provider = ScriptedProvider::new(|query, call| {
            let _ = query;
            Ok(records_for_query(call, 4))
        });
        let config = DiscoveryConfig {
            max_results_before_subdivide: 4,
            max_subdivision_depth: 2,
            num_passes: 1,
            ..test_config()
        };
        let mut engine = DiscoveryEngine::new(provider.clone(), config).unwrap();

        engine.discover_grid(&root()).await;

        assert_eq!(provider.call_count(), 21);
    }

    #[tokio::test]
    async fn test_first_seen_wins_on_duplicate_sightings() {
        let provider = ScriptedProvider::new(|_, call| {
            // The same listing shows up in every pass with a different
            // payload; only the first sighting may be kept.
            Ok(vec![raw_record(
                Some(42),
                41.5,
                -87.5,
                serde_json::json!({"room_id": 42, "seen_on_call": call}),
            )])
        });
        let config = DiscoveryConfig {
            num_passes: 2,
            ..test_config()
        };
        let mut engine = DiscoveryEngine::new(provider.clone(), config).unwrap();

        engine.discover_grid(&root()).await;

        assert_eq!(engine.listings().len(), 1);
        let listing = &engine.listings()[&42];
        assert_eq!(listing.pass_id, 0);
        assert_eq!(listing.raw["seen_on_call"], 0);
        assert!(listing.grid_id_assigned.is_none());
        assert_eq!(listing.grid_id_source, Some(1));
    }

    #[tokio::test]
    async fn test_multi_pass_coverage_is_monotonic() {
        let provider = ScriptedProvider::new(|_, call| {
            // Pass 0 sees {1, 2}; pass 1 sees {2, 3}.
            match call {
                0 => Ok(vec![record(1, 41.2, -87.2), record(2, 41.4, -87.4)]),
                _ => Ok(vec![record(2, 41.4, -87.4), record(3, 41.6, -87.6)]),
            }
        });
        let config = DiscoveryConfig {
            num_passes: 2,
            ..test_config()
        };
        let mut engine = DiscoveryEngine::new(provider.clone(), config).unwrap();

        let ids = engine.discover_grid(&root()).await;

        assert_eq!(ids, HashSet::from([1, 2, 3]));
        assert_eq!(engine.listings().len(), 3);
        assert_eq!(engine.listings()[&2].pass_id, 0);
        assert_eq!(engine.listings()[&3].pass_id, 1);
    }

    #[tokio::test]
    async fn test_cached_pass_short_circuits_requerying() {
        let cache_dir: PathBuf =
            std::env::temp_dir().join(format!("discovery-engine-{}", uuid::Uuid::new_v4()));
        let config = DiscoveryConfig {
            num_passes: 1,
            enable_cache: true,
            cache_dir: cache_dir.clone(),
            ..test_config()
        };

        let provider = ScriptedProvider::new(|_, _| Ok(vec![record(7, 41.5, -87.5)]));
        let mut engine = DiscoveryEngine::new(provider.clone(), config.clone()).unwrap();

        let first = engine.discover_grid(&root()).await;
        assert_eq!(provider.call_count(), 1);

        // Re-running the pass loads the cache entry: no new provider calls,
        // no change to the listings collection or call records.
        let listings_before = engine.listings().len();
        let records_before = engine.call_records().len();
        let second = engine.discover_grid(&root()).await;

        assert_eq!(provider.call_count(), 1);
        assert_eq!(first, second);
        assert_eq!(engine.listings().len(), listings_before);
        assert_eq!(engine.call_records().len(), records_before);

        // A fresh engine over the same cache dir resumes without querying.
        let resumed_provider = ScriptedProvider::new(|_, _| Ok(vec![]));
        let mut resumed = DiscoveryEngine::new(resumed_provider.clone(), config).unwrap();
        let resumed_ids = resumed.discover_grid(&root()).await;
        assert_eq!(resumed_provider.call_count(), 0);
        assert_eq!(resumed_ids, first);

        std::fs::remove_dir_all(cache_dir).unwrap();
    }

    #[tokio::test]
    async fn test_records_without_identifier_are_dropped() {
        let provider = ScriptedProvider::new(|_, _| {
            Ok(vec![
                record(5, 41.5, -87.5),
                raw_record(
                    None,
                    41.6,
                    -87.6,
                    serde_json::json!({"coordinates": {"latitude": 41.6}}),
                ),
            ])
        });
        let config = DiscoveryConfig {
            num_passes: 1,
            ..test_config()
        };
        let mut engine = DiscoveryEngine::new(provider.clone(), config).unwrap();

        let ids = engine.discover_grid(&root()).await;

        assert_eq!(ids, HashSet::from([5]));
        assert_eq!(engine.listings().len(), 1);
        // The malformed record still counted toward the call's result total.
        assert_eq!(engine.call_records()[0].results_count, 2);
    }

    #[tokio::test]
    async fn test_failed_branch_yields_zero_results_without_aborting() {
        let provider =
            ScriptedProvider::new(|_, _| Err(SearchError::EmptyResponse));
        let config = DiscoveryConfig {
            num_passes: 2,
            max_retries: 1,
            ..test_config()
        };
        let mut engine = DiscoveryEngine::new(provider.clone(), config).unwrap();

        let ids = engine.discover_grid(&root()).await;

        assert!(ids.is_empty());
        // One exhausted record per pass; zero results keeps the branch below
        // the subdivide threshold, so no drill-down happened.
        assert_eq!(engine.call_records().len(), 2);
        for call_record in engine.call_records() {
            assert_eq!(call_record.results_count, 0);
            assert_eq!(call_record.retry_count, 1);
            assert!(!call_record.subdivided);
        }
    }
}
