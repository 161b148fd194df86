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

// Library for waypoint-flight-search
// Flight search form model, airport autocomplete and the Sky Scrapper client

pub mod cache;
pub mod debounce;
mod error;
mod config;
mod passengers;
mod flights;
mod airports;
mod autocomplete;
mod search_params;
mod search_form;
mod results;
mod sky_client;

pub use error::{ApiError, ConfigError};
pub use config::{API_BASE_URL_VAR, API_HOST_VAR, API_KEY_VAR, ApiConfig};

// Form state
pub use passengers::{MAX_SEATED_PASSENGERS, PassengerCounts, PassengerKind};
pub use search_params::{
    CabinClass, TripSearchParams, TripSearchParamsBuilder, TripType, format_date, parse_date,
};
pub use search_form::{AirportField, SearchForm};

// Airport autocomplete
pub use airports::{
    AIRPORT_CACHE_TTL, AirportCandidate, AirportData, AirportLookup, AirportSource, Candidates,
    MIN_QUERY_CHARS,
};
pub use autocomplete::{AirportAutocomplete, SuggestionState};
pub use debounce::{AIRPORT_INPUT_QUIESCENCE, DebouncedValue, Debouncer, Ticket};

// Flight search and results
pub use flights::*;
pub use results::{
    FLIGHT_CACHE_TTL, FLIGHT_RETRY_INITIAL_DELAY, FLIGHT_RETRY_MAX_DELAY, FLIGHT_SEARCH_RETRIES,
    FlightResults, SearchOutcome,
};
pub use sky_client::{
    DEFAULT_QPS, DEFAULT_TIMEOUT_SECS, SkyScrapperClient, decode_envelope, parse_airports,
    parse_flights,
};
