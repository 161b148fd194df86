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

//! # Airport Lookup
//!
//! Maps a stabilized query string to candidate airports, caching answers
//! per exact query for [`AIRPORT_CACHE_TTL`].
//!
//! Concurrent lookups for the same query share a single upstream call;
//! lookups for different queries never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::cache::{DEFAULT_CACHE_CAPACITY, FreshnessCache};
use crate::error::ApiError;

/// Queries shorter than this (in characters) never reach the API.
pub const MIN_QUERY_CHARS: usize = 2;
pub const AIRPORT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);
pub const AIRPORT_SEARCH_LOCALE: &str = "en-US";

pub type Candidates = Arc<[AirportCandidate]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct AirportCandidate {
    /// Entity id of the place.
    pub id: String,
    pub name: String,
    pub city_name: String,
    pub country_name: String,
    /// Sky id, usually the IATA code.
    pub iata_code: String,
}

impl AirportCandidate {
    /// "London (LHR)"
    pub fn display_label(&self) -> String {
        format!("{} ({})", self.city_name, self.iata_code)
    }
}

// Wire format of the airport search endpoint.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AirportPresentation {
    pub title: String,
    pub suggestion_title: String,
    pub subtitle: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelevantFlightParams {
    pub sky_id: String,
    pub entity_id: String,
    pub flight_place_type: String,
    pub localized_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AirportNavigation {
    pub entity_id: String,
    pub entity_type: String,
    pub localized_name: String,
    pub relevant_flight_params: RelevantFlightParams,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AirportData {
    pub presentation: AirportPresentation,
    pub navigation: AirportNavigation,
}

impl From<AirportData> for AirportCandidate {
    fn from(data: AirportData) -> Self {
        Self {
            id: data.navigation.entity_id,
            name: data.presentation.title,
            city_name: data.presentation.suggestion_title,
            country_name: data.presentation.subtitle,
            iata_code: data.navigation.relevant_flight_params.sky_id,
        }
    }
}

/// The airport search collaborator.
#[async_trait]
pub trait AirportSource: Send + Sync {
    async fn search_airports(&self, query: &str) -> Result<Vec<AirportCandidate>, ApiError>;
}

pub struct AirportLookup {
    source: Arc<dyn AirportSource>,
    cache: Mutex<FreshnessCache<String, Candidates>>,
    in_flight: StdMutex<HashMap<String, Gate>>,
}

/// Per-query turn lock and the number of lookups holding it.
#[derive(Default)]
struct Gate {
    turn: Arc<Mutex<()>>,
    holders: usize,
}

/// One lookup's hold on a query's [`Gate`]. The last holder to drop,
/// finished or cancelled, removes the gate.
struct InFlight<'a> {
    gates: &'a StdMutex<HashMap<String, Gate>>,
    query: &'a str,
    turn: Arc<Mutex<()>>,
}

impl<'a> InFlight<'a> {
    fn join(gates: &'a StdMutex<HashMap<String, Gate>>, query: &'a str) -> Self {
        let mut map = gates.lock().unwrap_or_else(PoisonError::into_inner);
        let gate = map.entry(query.to_string()).or_default();
        gate.holders += 1;
        Self {
            gates,
            query,
            turn: Arc::clone(&gate.turn),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut map = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(gate) = map.get_mut(self.query) {
            gate.holders = gate.holders.saturating_sub(1);
            if gate.holders == 0 {
                map.remove(self.query);
            }
        }
    }
}

impl AirportLookup {
    pub fn new(source: Arc<dyn AirportSource>) -> Self {
        Self::with_cache(source, AIRPORT_CACHE_TTL, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_cache(source: Arc<dyn AirportSource>, ttl: Duration, capacity: usize) -> Self {
        Self {
            source,
            cache: Mutex::new(FreshnessCache::new(ttl, capacity)),
            in_flight: StdMutex::new(HashMap::new()),
        }
    }

    /// Candidates for `query`, keyed by the exact string.
    ///
    /// Failures are returned as-is: they are neither retried nor cached.
    pub async fn lookup(&self, query: &str) -> Result<Candidates, ApiError> {
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(Vec::<AirportCandidate>::new().into());
        }
        if let Some(hit) = self.cached(query).await {
            return Ok(hit);
        }

        let entry = InFlight::join(&self.in_flight, query);
        let _turn = entry.turn.lock().await;

        // Someone holding the gate before us may have filled the cache.
        match self.cached(query).await {
            Some(hit) => Ok(hit),
            None => self.fetch_and_store(query).await,
        }
    }

    /// Queries with a lookup currently waiting or running.
    pub fn pending_lookups(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Turn free text into a selection: an exact code match wins, otherwise
    /// the first candidate. `None` when nothing matches.
    pub async fn resolve(&self, text: &str) -> Result<Option<AirportCandidate>, ApiError> {
        let text = text.trim();
        let candidates = self.lookup(text).await?;
        let exact = candidates
            .iter()
            .find(|c| c.iata_code.eq_ignore_ascii_case(text));
        Ok(exact.or_else(|| candidates.first()).cloned())
    }

    async fn fetch_and_store(&self, query: &str) -> Result<Candidates, ApiError> {
        let start = std::time::Instant::now();
        let result = self.source.search_airports(query).await;
        tracing::debug!(
            "[airport_lookup] upstream call for {:?} took {:?}",
            query,
            start.elapsed()
        );

        match result {
            Ok(candidates) => {
                let candidates: Candidates = candidates.into();
                self.cache
                    .lock()
                    .await
                    .insert(query.to_string(), Arc::clone(&candidates));
                Ok(candidates)
            }
            Err(e) => {
                tracing::warn!("[airport_lookup] lookup for {:?} failed: {}", query, e);
                Err(e)
            }
        }
    }

    async fn cached(&self, query: &str) -> Option<Candidates> {
        let hit = self.cache.lock().await.get(&query.to_string());
        if hit.is_some() {
            tracing::debug!("[airport_lookup] cache hit for {:?}", query);
        }
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_from_wire_format() {
        let json = r#"{
            "presentation": {"title": "London Heathrow", "suggestionTitle": "London Heathrow (LHR)", "subtitle": "United Kingdom"},
            "navigation": {
                "entityId": "95565050",
                "entityType": "AIRPORT",
                "localizedName": "London Heathrow",
                "relevantFlightParams": {"skyId": "LHR", "entityId": "95565050", "flightPlaceType": "AIRPORT", "localizedName": "London Heathrow"}
            }
        }"#;
        let data: AirportData = serde_json::from_str(json).unwrap();
        let candidate = AirportCandidate::from(data);
        assert_eq!(candidate.id, "95565050");
        assert_eq!(candidate.name, "London Heathrow");
        assert_eq!(candidate.city_name, "London Heathrow (LHR)");
        assert_eq!(candidate.country_name, "United Kingdom");
        assert_eq!(candidate.iata_code, "LHR");
    }

    #[test]
    fn test_display_label() {
        let candidate = AirportCandidate {
            id: "27537542".into(),
            name: "New York".into(),
            city_name: "New York".into(),
            country_name: "United States".into(),
            iata_code: "NYCA".into(),
        };
        assert_eq!(candidate.display_label(), "New York (NYCA)");
    }
}
