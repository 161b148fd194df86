//! In-memory stand-ins for the Sky Scrapper collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use waypoint_flight_search::{
    AirportCandidate, AirportSource, ApiError, FlightSearchData, FlightSearchRequest, FlightSource,
};

pub fn airport(code: &str, entity_id: &str, city: &str, name: &str) -> AirportCandidate {
    AirportCandidate {
        id: entity_id.to_string(),
        name: name.to_string(),
        city_name: city.to_string(),
        country_name: "Somewhere".to_string(),
        iata_code: code.to_string(),
    }
}

pub fn jfk() -> AirportCandidate {
    airport("JFK", "95565058", "New York", "New York John F. Kennedy")
}

pub fn lhr() -> AirportCandidate {
    airport("LHR", "95565050", "London", "London Heathrow")
}

#[derive(Default)]
pub struct FakeAirports {
    calls: Mutex<Vec<String>>,
    canned: HashMap<String, Vec<AirportCandidate>>,
    delays: HashMap<String, Duration>,
    failing: AtomicBool,
}

impl FakeAirports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(mut self, query: &str, airports: Vec<AirportCandidate>) -> Self {
        self.canned.insert(query.to_string(), airports);
        self
    }

    pub fn with_delay(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AirportSource for FakeAirports {
    async fn search_airports(&self, query: &str) -> Result<Vec<AirportCandidate>, ApiError> {
        self.calls.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::airports_rejected());
        }
        Ok(self.canned.get(query).cloned().unwrap_or_else(|| {
            let code: String = query.chars().take(3).collect::<String>().to_uppercase();
            vec![airport(&code, &format!("id-{}", query), query, query)]
        }))
    }
}

/// Fails the first `failures` calls, then answers with `data`.
pub struct FakeFlights {
    calls: AtomicUsize,
    failures: usize,
    error: ApiError,
    data: FlightSearchData,
    requests: Mutex<Vec<FlightSearchRequest>>,
}

impl FakeFlights {
    pub fn answering(data: FlightSearchData) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failures: 0,
            error: ApiError::network(),
            data,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_first(mut self, failures: usize, error: ApiError) -> Self {
        self.failures = failures;
        self.error = error;
        self
    }

    pub fn always_failing(error: ApiError) -> Self {
        Self::answering(FlightSearchData::default()).failing_first(usize::MAX, error)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<FlightSearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlightSource for FakeFlights {
    async fn search_flights(
        &self,
        request: &FlightSearchRequest,
    ) -> Result<FlightSearchData, ApiError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if n < self.failures {
            return Err(self.error.clone());
        }
        Ok(self.data.clone())
    }
}
