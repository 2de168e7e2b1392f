//! Shared test doubles for engine and executor tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use listing_search::{SearchError, SearchProvider, SearchQuery, SearchRecord};
use serde_json::{Value, json};

use crate::config::DiscoveryConfig;

type Responder =
    dyn Fn(&SearchQuery, usize) -> Result<Vec<SearchRecord>, SearchError> + Send + Sync;

/// Scripted provider double: answers each call through a closure that also
/// sees the zero-based call index, and logs every query it receives.
pub(crate) struct ScriptedProvider {
    queries: Mutex<Vec<SearchQuery>>,
    respond: Box<Responder>,
}

impl ScriptedProvider {
    pub fn new(
        respond: impl Fn(&SearchQuery, usize) -> Result<Vec<SearchRecord>, SearchError>
        + Send
        + Sync
        + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            queries: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SearchProvider for ScriptedProvider {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchRecord>, SearchError> {
        let call = {
            let mut queries = self.queries.lock().unwrap();
            queries.push(query.clone());
            queries.len() - 1
        };
        (self.respond)(query, call)
    }
}

/// A well-formed search result with a synthetic raw payload.
pub(crate) fn record(id: i64, lat: f64, lon: f64) -> SearchRecord {
    raw_record(
        Some(id),
        lat,
        lon,
        json!({"room_id": id, "coordinates": {"latitude": lat, "longitude": lon}}),
    )
}

/// A search result with full control over the identifier and payload.
pub(crate) fn raw_record(id: Option<i64>, lat: f64, lon: f64, raw: Value) -> SearchRecord {
    SearchRecord {
        listing_id: id,
        latitude: lat,
        longitude: lon,
        raw,
    }
}

/// `n` distinct records whose ids are unique per call index, so every cell's
/// response contributes fresh listings.
pub(crate) fn records_for_query(call: usize, n: usize) -> Vec<SearchRecord> {
    (0..n)
        .map(|i| record((call * 100 + i) as i64, 41.5, -87.5))
        .collect()
}

/// Fast deterministic configuration for tests: millisecond backoff, an
/// effectively unlimited pacing budget, caching off, fixed seed.
pub(crate) fn test_config() -> DiscoveryConfig {
    DiscoveryConfig {
        requests_per_minute: 60_000,
        retry_delay_base: Duration::from_millis(1),
        num_passes: 1,
        enable_cache: false,
        rng_seed: Some(7),
        ..DiscoveryConfig::default()
    }
}
