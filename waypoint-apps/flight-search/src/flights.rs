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

//! # Flight search data
//!
//! Request and response shapes of the flight search endpoint, plus the
//! presentation helpers used to render itineraries.
//!
//! Decoding is lenient: every field defaults when absent, and identifiers
//! are accepted as either JSON strings or numbers.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;
use crate::search_params::CabinClass;

/// Number of itineraries requested per search.
pub const DEFAULT_RESULT_LIMIT: u32 = 20;

pub const NO_FLIGHTS_MESSAGE: &str = "No flights found for this route";

/// Query sent to the flight search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSearchRequest {
    pub origin_sky_id: String,
    pub destination_sky_id: String,
    pub date: String,
    pub adults: u32,
    /// Spelled this way by the API.
    pub childrens: u32,
    pub infants: u32,
    pub origin_entity_id: String,
    pub destination_entity_id: String,
    pub cabin_class: CabinClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    pub limit: u32,
}

impl FlightSearchRequest {
    /// Query parameters in the order the API documents them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("originSkyId", self.origin_sky_id.clone()),
            ("destinationSkyId", self.destination_sky_id.clone()),
            ("date", self.date.clone()),
            ("adults", self.adults.to_string()),
            ("childrens", self.childrens.to_string()),
            ("infants", self.infants.to_string()),
            ("originEntityId", self.origin_entity_id.clone()),
            ("destinationEntityId", self.destination_entity_id.clone()),
            ("cabinClass", self.cabin_class.as_str().to_string()),
        ];
        if let Some(rd) = &self.return_date {
            pairs.push(("returnDate", rd.clone()));
        }
        pairs.push(("limit", self.limit.to_string()));
        pairs
    }
}

/// The flight search collaborator.
#[async_trait]
pub trait FlightSource: Send + Sync {
    async fn search_flights(&self, request: &FlightSearchRequest)
    -> Result<FlightSearchData, ApiError>;
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Carrier {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub logo_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Segment {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub departure: String,
    pub arrival: String,
    #[serde(deserialize_with = "string_or_number")]
    pub flight_number: String,
    #[serde(alias = "marketingCarrier")]
    pub carrier: Option<Carrier>,
}

/// Airport as it appears on a leg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegPlace {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub entity_id: String,
    pub name: String,
    pub display_code: String,
    pub city: String,
    pub country: String,
    pub is_highlighted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegCarriers {
    pub marketing: Vec<Carrier>,
    pub operation_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Leg {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub origin: LegPlace,
    pub destination: LegPlace,
    pub duration_in_minutes: u32,
    pub stop_count: u32,
    pub is_smallest_stops: bool,
    pub departure: String,
    pub arrival: String,
    pub time_delta_in_days: i32,
    pub carriers: LegCarriers,
    pub segments: Vec<Segment>,
}

impl Leg {
    pub fn duration_label(&self) -> String {
        fmt_duration(self.duration_in_minutes)
    }

    pub fn stops_label(&self) -> String {
        fmt_stops(self.stop_count)
    }

    pub fn departure_time(&self) -> String {
        clock_time(&self.departure)
    }

    pub fn arrival_time(&self) -> String {
        if self.time_delta_in_days > 0 {
            format!("{} +{}d", clock_time(&self.arrival), self.time_delta_in_days)
        } else {
            clock_time(&self.arrival)
        }
    }

    /// "JFK-LHR"
    pub fn route_label(&self) -> String {
        format!(
            "{}-{}",
            self.origin.display_code, self.destination.display_code
        )
    }

    pub fn carrier_name(&self) -> Option<&str> {
        self.carriers.marketing.first().map(|c| c.name.as_str())
    }

    pub fn flight_number(&self) -> Option<&str> {
        self.segments
            .first()
            .map(|s| s.flight_number.as_str())
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Price {
    pub raw: f64,
    pub formatted: String,
    pub pricing_option_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FarePolicy {
    pub is_change_allowed: bool,
    pub is_partially_changeable: bool,
    pub is_cancellation_allowed: bool,
    pub is_partially_refundable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Itinerary {
    pub id: String,
    pub price: Price,
    pub legs: Vec<Leg>,
    pub is_self_transfer: bool,
    pub is_protected_self_transfer: bool,
    pub fare_policy: FarePolicy,
    pub tags: Vec<String>,
    pub is_mash_up: bool,
    pub has_flexible_options: bool,
    pub score: f64,
}

impl Itinerary {
    pub fn outbound(&self) -> Option<&Leg> {
        self.legs.first()
    }

    pub fn primary_carrier(&self) -> Option<&str> {
        self.outbound().and_then(Leg::carrier_name)
    }

    pub fn summary(&self) -> ItinerarySummary {
        ItinerarySummary {
            id: self.id.clone(),
            price: self.price.formatted.clone(),
            legs: self
                .legs
                .iter()
                .enumerate()
                .map(|(idx, leg)| LegSummary {
                    label: leg_label(idx).to_string(),
                    carrier: leg.carrier_name().unwrap_or("Unknown").to_string(),
                    flight_number: leg.flight_number().map(str::to_string),
                    route: leg.route_label(),
                    departure: leg.departure_time(),
                    arrival: leg.arrival_time(),
                    duration: leg.duration_label(),
                    stops: leg.stops_label(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlightContext {
    pub status: String,
    pub total_results: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DurationStats {
    pub min: u32,
    pub max: u32,
    pub multi_city_min: u32,
    pub multi_city_max: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterAirport {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub entity_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CityAirports {
    pub city: String,
    pub airports: Vec<FilterAirport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StopPrice {
    pub is_present: bool,
    pub formatted_price: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StopPrices {
    pub direct: StopPrice,
    pub one: StopPrice,
    pub two_or_more: StopPrice,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterStats {
    pub duration: DurationStats,
    pub airports: Vec<CityAirports>,
    pub carriers: Vec<Carrier>,
    pub stop_prices: StopPrices,
}

/// Payload of a successful flight search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlightSearchData {
    pub context: FlightContext,
    pub itineraries: Vec<Itinerary>,
    pub messages: Vec<serde_json::Value>,
    pub filter_stats: FilterStats,
    pub flights_session_id: String,
    pub destination_image_url: String,
}

impl FlightSearchData {
    pub fn len(&self) -> usize {
        self.itineraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itineraries.is_empty()
    }

    pub fn cheapest(&self) -> Option<&Itinerary> {
        self.itineraries
            .iter()
            .min_by(|a, b| a.price.raw.total_cmp(&b.price.raw))
    }
}

/// Flattened itinerary for text and JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItinerarySummary {
    pub id: String,
    pub price: String,
    pub legs: Vec<LegSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegSummary {
    pub label: String,
    pub carrier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_number: Option<String>,
    pub route: String,
    pub departure: String,
    pub arrival: String,
    pub duration: String,
    pub stops: String,
}

/// "Outbound" for the first leg, "Return" for the rest.
pub fn leg_label(index: usize) -> &'static str {
    if index == 0 { "Outbound" } else { "Return" }
}

/// "7h 5m"
pub fn fmt_duration(minutes: u32) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// "Nonstop", "1 stop", "2 stops"
pub fn fmt_stops(stop_count: u32) -> String {
    match stop_count {
        0 => "Nonstop".to_string(),
        1 => "1 stop".to_string(),
        n => format!("{} stops", n),
    }
}

/// "HH:MM" from an API local timestamp, or the raw value if it does not parse.
fn clock_time(timestamp: &str) -> String {
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M"))
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}
