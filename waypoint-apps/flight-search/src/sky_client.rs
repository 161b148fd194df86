//!  Waypoint Flight Search
//!
//!  Copyright (C) 2026  Mamy Ratsimbazafy
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # Sky Scrapper API Client
//!
//! Effectful (network) side of the airport and flight searches.
//! Requests are rate limited but never retried here; retrying is the
//! caller's decision.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use waypoint_query_queues::{QueryQueue, RetryPolicy};

use crate::airports::{AIRPORT_SEARCH_LOCALE, AirportCandidate, AirportData, AirportSource};
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::flights::{FlightSearchData, FlightSearchRequest, FlightSource};
use crate::search_params::encode_query;

pub const SEARCH_AIRPORT_PATH: &str = "/v1/flights/searchAirport";
pub const SEARCH_FLIGHTS_PATH: &str = "/v2/flights/searchFlights";

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_QPS: u32 = 2;

/// `{status, timestamp, sessionId?, data}` wrapper shared by all endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Clone)]
pub struct SkyScrapperClient {
    client: Arc<wreq::Client>,
    query_queue: QueryQueue,
    config: ApiConfig,
}

impl SkyScrapperClient {
    pub fn new(config: ApiConfig, timeout_secs: u64, queries_per_second: u32) -> Result<Self> {
        let client = wreq::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let query_queue =
            QueryQueue::with_qps_limit(queries_per_second as u64).with_retry_policy(RetryPolicy::none());
        Ok(Self {
            client: Arc::new(client),
            query_queue,
            config,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// GET `{base}{path}?{query}` with the API credentials, returning the body.
    pub async fn fetch_raw(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let url = format!("{}{}?{}", self.config.base_url, path, encode_query(query));
        let api_key = self.config.api_key.clone();
        let api_host = self.config.host.clone();
        let client_inner = Arc::clone(&self.client);

        let queue_start = std::time::Instant::now();
        let response = self
            .query_queue
            .with_retry(move || {
                let url = url.clone();
                let api_key = api_key.clone();
                let api_host = api_host.clone();
                let http_client = client_inner.clone();
                async move {
                    let http_start = std::time::Instant::now();
                    tracing::trace!("[fetch_raw] Starting HTTP request to: {}", url);
                    let resp = http_client
                        .get(url)
                        .header("x-rapidapi-key", api_key)
                        .header("x-rapidapi-host", api_host)
                        .send()
                        .await?;
                    tracing::trace!(
                        "[fetch_raw] HTTP request completed in {:?}",
                        http_start.elapsed()
                    );
                    Ok(resp)
                }
            })
            .await;
        tracing::debug!(
            "[fetch_raw] Query queue + HTTP execution time: {:?}",
            queue_start.elapsed()
        );

        let response = response.map_err(|e| anyhow!("Request failed: {:#}", e))?;

        let status = response.status();
        tracing::debug!(
            "[fetch_raw] HTTP Status: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        );

        let body = response.text().await.context("Read body")?;
        tracing::debug!("[fetch_raw] Response body: {} bytes", body.len());

        if !status.is_success() {
            let body_preview = body.chars().take(500).collect::<String>();
            bail!("HTTP error {}: {}", status, body_preview);
        }

        Ok(body)
    }

    async fn fetch_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        rejected: fn() -> ApiError,
    ) -> Result<T, ApiError> {
        let body = self.fetch_raw(path, query).await.map_err(|e| {
            tracing::warn!("[sky_client] {} failed: {:#}", path, e);
            ApiError::network()
        })?;
        decode_envelope(&body, rejected)
    }
}

/// Decode an API answer: `status: false` is a rejection, anything that
/// does not decode is a network error.
pub fn decode_envelope<T: DeserializeOwned>(
    body: &str,
    rejected: fn() -> ApiError,
) -> Result<T, ApiError> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|e| {
        tracing::warn!("[sky_client] undecodable response: {}", e);
        ApiError::network()
    })?;
    if !envelope.status {
        return Err(rejected());
    }
    serde_json::from_value(envelope.data).map_err(|e| {
        tracing::warn!("[sky_client] unexpected data shape: {}", e);
        ApiError::network()
    })
}

/// Airport candidates from a search-airport response body.
pub fn parse_airports(body: &str) -> Result<Vec<AirportCandidate>, ApiError> {
    let data: Vec<AirportData> = decode_envelope(body, ApiError::airports_rejected)?;
    Ok(data.into_iter().map(AirportCandidate::from).collect())
}

/// Flight search payload from a search-flights response body.
pub fn parse_flights(body: &str) -> Result<FlightSearchData, ApiError> {
    decode_envelope(body, ApiError::flights_rejected)
}

#[async_trait]
impl AirportSource for SkyScrapperClient {
    async fn search_airports(&self, query: &str) -> Result<Vec<AirportCandidate>, ApiError> {
        let pairs = [
            ("query", query.to_string()),
            ("locale", AIRPORT_SEARCH_LOCALE.to_string()),
        ];
        let data: Vec<AirportData> = self
            .fetch_data(SEARCH_AIRPORT_PATH, &pairs, ApiError::airports_rejected)
            .await?;
        tracing::debug!("[sky_client] {} airports for {:?}", data.len(), query);
        Ok(data.into_iter().map(AirportCandidate::from).collect())
    }
}

#[async_trait]
impl FlightSource for SkyScrapperClient {
    async fn search_flights(
        &self,
        request: &FlightSearchRequest,
    ) -> Result<FlightSearchData, ApiError> {
        tracing::info!(
            "Searching flights {} -> {} on {}",
            request.origin_sky_id,
            request.destination_sky_id,
            request.date
        );
        self.fetch_data(
            SEARCH_FLIGHTS_PATH,
            &request.query_pairs(),
            ApiError::flights_rejected,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_airports() {
        let err = parse_airports(r#"{"status": false, "timestamp": 1, "message": "bad"}"#)
            .unwrap_err();
        assert_eq!(err, ApiError::airports_rejected());
        assert_eq!(err.status, 400);
    }

    #[test]
    fn test_garbage_is_network_error() {
        let err = parse_flights("<html>gateway timeout</html>").unwrap_err();
        assert_eq!(err, ApiError::network());
        assert_eq!(err.status, 500);
    }

    #[test]
    fn test_airports_envelope() {
        let body = r#"{
            "status": true,
            "timestamp": 1718000000000,
            "data": [{
                "presentation": {"title": "New York", "suggestionTitle": "New York (Any)", "subtitle": "United States"},
                "navigation": {"entityId": "27537542", "entityType": "CITY", "localizedName": "New York",
                    "relevantFlightParams": {"skyId": "NYCA", "entityId": "27537542", "flightPlaceType": "CITY", "localizedName": "New York"}}
            }]
        }"#;
        let airports = parse_airports(body).unwrap();
        assert_eq!(airports.len(), 1);
        assert_eq!(airports[0].iata_code, "NYCA");
        assert_eq!(airports[0].id, "27537542");
    }
}
