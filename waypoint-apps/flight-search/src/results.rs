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

//! # Flight Results
//!
//! The results stage: takes search parameters, issues the flight search
//! with bounded retries and keeps successful answers fresh for
//! [`FLIGHT_CACHE_TTL`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use waypoint_query_queues::{QueryQueue, RetryPolicy};

use crate::cache::{DEFAULT_CACHE_CAPACITY, FreshnessCache};
use crate::error::ApiError;
use crate::flights::{
    DEFAULT_RESULT_LIMIT, FlightSearchData, FlightSearchRequest, FlightSource, NO_FLIGHTS_MESSAGE,
};
use crate::search_params::TripSearchParams;

pub const FLIGHT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Retries after the first failed attempt.
pub const FLIGHT_SEARCH_RETRIES: u32 = 2;
pub const FLIGHT_RETRY_INITIAL_DELAY: Duration = Duration::from_millis(1000);
pub const FLIGHT_RETRY_MAX_DELAY: Duration = Duration::from_secs(10);

/// What the results page shows for a set of parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Required fields are missing: show the form, issue no request.
    Incomplete { missing: Vec<&'static str> },
    Failed(ApiError),
    Flights(Arc<FlightSearchData>),
}

impl SearchOutcome {
    pub fn flights(&self) -> Option<&FlightSearchData> {
        match self {
            Self::Flights(data) => Some(data),
            _ => None,
        }
    }

    /// Banner text for the outcome, if any.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Incomplete { missing } => {
                Some(format!("Missing search fields: {}", missing.join(", ")))
            }
            Self::Failed(e) => Some(e.message.clone()),
            Self::Flights(data) if data.is_empty() => Some(NO_FLIGHTS_MESSAGE.to_string()),
            Self::Flights(_) => None,
        }
    }
}

pub struct FlightResults {
    source: Arc<dyn FlightSource>,
    queue: QueryQueue,
    cache: Mutex<FreshnessCache<FlightSearchRequest, Arc<FlightSearchData>>>,
    limit: u32,
}

impl FlightResults {
    pub fn new(source: Arc<dyn FlightSource>) -> Self {
        let retry = RetryPolicy::exponential(
            FLIGHT_SEARCH_RETRIES,
            FLIGHT_RETRY_INITIAL_DELAY,
            FLIGHT_RETRY_MAX_DELAY,
        );
        Self::with_queue(source, QueryQueue::default().with_retry_policy(retry))
    }

    /// Custom queue, e.g. a different retry policy.
    pub fn with_queue(source: Arc<dyn FlightSource>, queue: QueryQueue) -> Self {
        Self {
            source,
            queue,
            cache: Mutex::new(FreshnessCache::new(FLIGHT_CACHE_TTL, DEFAULT_CACHE_CAPACITY)),
            limit: DEFAULT_RESULT_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub async fn search(&self, params: &TripSearchParams) -> SearchOutcome {
        let Some(request) = params.to_flight_request(self.limit) else {
            let missing = params.missing_fields();
            tracing::info!("search incomplete, missing: {}", missing.join(", "));
            return SearchOutcome::Incomplete { missing };
        };

        if let Some(hit) = self.cache.lock().await.get(&request) {
            tracing::debug!(
                "[flight_results] cache hit for {} -> {}",
                request.origin_sky_id,
                request.destination_sky_id
            );
            return SearchOutcome::Flights(hit);
        }

        let start = std::time::Instant::now();
        let source = Arc::clone(&self.source);
        let shared = Arc::new(request.clone());
        let result = self
            .queue
            .with_retry(move || {
                let source = Arc::clone(&source);
                let request = Arc::clone(&shared);
                async move { Ok(source.search_flights(&request).await?) }
            })
            .await;

        match result {
            Ok(data) => {
                tracing::info!(
                    "found {} itineraries {} -> {} in {:?}",
                    data.len(),
                    request.origin_sky_id,
                    request.destination_sky_id,
                    start.elapsed()
                );
                let data = Arc::new(data);
                self.cache.lock().await.insert(request, Arc::clone(&data));
                SearchOutcome::Flights(data)
            }
            Err(e) => {
                let error = e
                    .last_error()
                    .map_or_else(ApiError::network, ApiError::from_anyhow);
                tracing::warn!("flight search failed: {:#}", e);
                SearchOutcome::Failed(error)
            }
        }
    }
}
