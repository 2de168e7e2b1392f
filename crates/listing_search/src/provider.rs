use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One map-search request against the provider.
///
/// Empty `check_in`/`check_out` strings mean "no date filter" — the provider
/// then returns listings regardless of availability.
#[derive(Debug, Clone, Serialize)]
pub struct SearchQuery {
    /// North-east corner latitude of the bounding rectangle
    pub ne_lat: f64,
    /// North-east corner longitude
    pub ne_long: f64,
    /// South-west corner latitude
    pub sw_lat: f64,
    /// South-west corner longitude
    pub sw_long: f64,
    /// Check-in date (`%Y-%m-%d`), empty for no date filter
    pub check_in: String,
    /// Check-out date (`%Y-%m-%d`), empty for no date filter
    pub check_out: String,
    /// Map zoom level the provider should evaluate the query at
    pub zoom: u32,
    /// Minimum nightly price filter
    pub price_min: u32,
    /// Maximum nightly price filter
    pub price_max: u32,
    /// ISO currency code for the price filter
    pub currency: String,
    /// Client identity (user agent) to present, when rotation is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_identity: Option<String>,
}

/// One result record from a search response.
///
/// The raw provider payload is preserved verbatim for downstream enrichment;
/// a record without a listing id is not discoverable and callers skip it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRecord {
    /// External listing identifier, absent on malformed records
    pub listing_id: Option<i64>,
    /// Latitude as reported by the provider
    pub latitude: f64,
    /// Longitude as reported by the provider
    pub longitude: f64,
    /// Full raw result payload
    pub raw: Value,
}

/// Errors from a single provider call.
///
/// The discovery executor treats every variant as transient and retries.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Transport-level failure reaching the provider
    #[error("Network error: {0}")]
    Network(String),

    /// Provider returned a non-success status
    #[error("API error: {0}")]
    Api(String),

    /// Provider throttled the request
    #[error("Rate limited by search provider")]
    RateLimited,

    /// Endpoint or region not found
    #[error("Search endpoint not found")]
    NotFound,

    /// Provider signalled no data where results were expected
    #[error("Empty response from search provider")]
    EmptyResponse,

    /// Response body did not match the expected shape
    #[error("Data format error: {0}")]
    DataFormat(String),
}

/// A search provider the discovery engine can query.
///
/// Implemented by [`crate::HttpSearchClient`] for the real provider and by
/// scripted doubles in engine tests.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    /// Execute one search call, returning every result record in the
    /// provider's response.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchRecord>, SearchError>;
}
