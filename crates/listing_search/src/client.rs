use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::provider::{SearchError, SearchProvider, SearchQuery, SearchRecord};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Reqwest-backed client for the listing search provider's map-search API.
pub struct HttpSearchClient {
    client: Client,
    base_url: String,
}

/// Top-level shape of a map-search response.
#[derive(Debug, Deserialize)]
struct MapSearchResponse {
    #[serde(default)]
    results: Option<Vec<Value>>,

    #[serde(default)]
    error: Option<String>,
}

impl HttpSearchClient {
    /// Create a new search client against the given provider base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SearchError> {
        let client = Client::builder()
            .user_agent(crate::identity::USER_AGENT_POOL[0])
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| SearchError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn build_params(query: &SearchQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("ne_lat", query.ne_lat.to_string()),
            ("ne_long", query.ne_long.to_string()),
            ("sw_lat", query.sw_lat.to_string()),
            ("sw_long", query.sw_long.to_string()),
            ("zoom", query.zoom.to_string()),
            ("price_min", query.price_min.to_string()),
            ("price_max", query.price_max.to_string()),
            ("currency", query.currency.clone()),
        ];

        // Blank dates mean "no availability filter"; the provider treats a
        // missing parameter the same way, so omit them entirely.
        if !query.check_in.is_empty() {
            params.push(("check_in", query.check_in.clone()));
        }
        if !query.check_out.is_empty() {
            params.push(("check_out", query.check_out.clone()));
        }

        params
    }

    /// Extract a typed record from one raw result payload.
    ///
    /// The raw value is preserved untouched; only the id and coordinates are
    /// lifted out. A missing id yields `listing_id: None` and the caller
    /// decides whether to skip the record.
    fn parse_record(raw: Value) -> SearchRecord {
        let listing_id = raw.get("room_id").and_then(Value::as_i64);

        let coords = raw.get("coordinates");
        let latitude = coords
            .and_then(|c| c.get("latitude"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        // Some tile responses misspell the key.
        let longitude = coords
            .and_then(|c| c.get("longitude").or_else(|| c.get("longitud")))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        SearchRecord {
            listing_id,
            latitude,
            longitude,
            raw,
        }
    }
}

#[async_trait::async_trait]
impl SearchProvider for HttpSearchClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchRecord>, SearchError> {
        let url = format!("{}/api/v2/map_search", self.base_url);
        let params = Self::build_params(query);

        debug!(
            "Searching bbox ({}, {}) .. ({}, {}) zoom={}",
            query.sw_lat, query.sw_long, query.ne_lat, query.ne_long, query.zoom
        );

        let mut request = self.client.get(&url).query(&params);
        if let Some(ref identity) = query.client_identity {
            request = request.header("User-Agent", identity);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SearchError::Network(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            match status.as_u16() {
                429 => return Err(SearchError::RateLimited),
                404 => return Err(SearchError::NotFound),
                _ => return Err(SearchError::Api(format!("HTTP {}", status))),
            }
        }

        let body: MapSearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::DataFormat(format!("Failed to parse response: {}", e)))?;

        let results = match body.results {
            Some(results) => results,
            None => {
                // A body without a results array is the provider's no-data
                // sentinel; the retry policy handles it like any failure.
                if let Some(err) = body.error {
                    warn!("Provider returned error payload: {}", err);
                }
                return Err(SearchError::EmptyResponse);
            }
        };

        Ok(results.into_iter().map(Self::parse_record).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_record_with_full_payload() {
        let raw = json!({
            "room_id": 12345,
            "coordinates": {"latitude": 41.88, "longitude": -87.63},
            "name": "Loop studio"
        });

        let record = HttpSearchClient::parse_record(raw.clone());
        assert_eq!(record.listing_id, Some(12345));
        assert_eq!(record.latitude, 41.88);
        assert_eq!(record.longitude, -87.63);
        assert_eq!(record.raw, raw);
    }

    #[test]
    fn test_parse_record_misspelled_longitude_key() {
        let raw = json!({
            "room_id": 7,
            "coordinates": {"latitude": 38.3, "longitud": -122.28}
        });

        let record = HttpSearchClient::parse_record(raw);
        assert_eq!(record.longitude, -122.28);
    }

    #[test]
    fn test_parse_record_missing_id_is_preserved_as_none() {
        let raw = json!({"coordinates": {"latitude": 1.0, "longitude": 2.0}});

        let record = HttpSearchClient::parse_record(raw);
        assert!(record.listing_id.is_none());
    }

    #[test]
    fn test_build_params_omits_blank_dates() {
        let query = SearchQuery {
            ne_lat: 42.0,
            ne_long: -87.0,
            sw_lat: 41.0,
            sw_long: -88.0,
            check_in: String::new(),
            check_out: String::new(),
            zoom: 15,
            price_min: 300,
            price_max: 10000,
            currency: "USD".to_string(),
            client_identity: None,
        };

        let params = HttpSearchClient::build_params(&query);
        assert!(params.iter().all(|(k, _)| *k != "check_in"));
        assert!(params.iter().all(|(k, _)| *k != "check_out"));

        let dated = SearchQuery {
            check_in: "2026-09-07".to_string(),
            check_out: "2026-09-09".to_string(),
            ..query
        };
        let params = HttpSearchClient::build_params(&dated);
        assert!(params.contains(&("check_in", "2026-09-07".to_string())));
        assert!(params.contains(&("check_out", "2026-09-09".to_string())));
    }
}
