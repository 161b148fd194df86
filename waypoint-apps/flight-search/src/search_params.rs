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

//! # Search Parameter Builder
//!
//! Side-effect free assembly of [`TripSearchParams`] and its two encodings:
//! the results-page query string and the flight search API request.

use anyhow::{Result, ensure};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::airports::AirportCandidate;
use crate::flights::FlightSearchRequest;
use crate::passengers::PassengerCounts;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
pub enum TripType {
    #[default]
    #[serde(rename = "oneWay", alias = "one-way", alias = "one_way")]
    OneWay,
    #[serde(rename = "roundTrip", alias = "round-trip", alias = "round_trip")]
    RoundTrip,
}

impl TripType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneWay => "oneWay",
            Self::RoundTrip => "roundTrip",
        }
    }

    pub fn from_str_name(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "oneway" | "one" | "ow" => Some(Self::OneWay),
            "roundtrip" | "round" | "rt" => Some(Self::RoundTrip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum CabinClass {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    pub const ALL: [CabinClass; 4] = [
        Self::Economy,
        Self::PremiumEconomy,
        Self::Business,
        Self::First,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Economy => "economy",
            Self::PremiumEconomy => "premium_economy",
            Self::Business => "business",
            Self::First => "first",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Economy => "Economy",
            Self::PremiumEconomy => "Premium Economy",
            Self::Business => "Business",
            Self::First => "First",
        }
    }

    pub fn from_str_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "economy" | "e" => Some(Self::Economy),
            "premium_economy" | "premiumeconomy" | "premium" | "pe" => Some(Self::PremiumEconomy),
            "business" | "b" => Some(Self::Business),
            "first" | "f" => Some(Self::First),
            _ => None,
        }
    }
}

/// Parameters of one submitted search. Immutable once built.
///
/// Unresolved airports leave their code and entity id empty, which makes
/// the search incomplete rather than invalid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSearchParams {
    trip_type: TripType,
    origin_code: String,
    destination_code: String,
    origin_entity_id: String,
    destination_entity_id: String,
    departure_date: Option<NaiveDate>,
    return_date: Option<NaiveDate>,
    passengers: PassengerCounts,
    cabin_class: CabinClass,
}

impl TripSearchParams {
    pub fn builder(trip_type: TripType) -> TripSearchParamsBuilder {
        TripSearchParamsBuilder {
            trip_type,
            ..Default::default()
        }
    }

    pub fn trip_type(&self) -> TripType {
        self.trip_type
    }

    pub fn origin_code(&self) -> &str {
        &self.origin_code
    }

    pub fn destination_code(&self) -> &str {
        &self.destination_code
    }

    pub fn origin_entity_id(&self) -> &str {
        &self.origin_entity_id
    }

    pub fn destination_entity_id(&self) -> &str {
        &self.destination_entity_id
    }

    pub fn departure_date(&self) -> Option<NaiveDate> {
        self.departure_date
    }

    pub fn return_date(&self) -> Option<NaiveDate> {
        self.return_date
    }

    pub fn passengers(&self) -> PassengerCounts {
        self.passengers
    }

    pub fn cabin_class(&self) -> CabinClass {
        self.cabin_class
    }

    /// Origin, destination and departure date are all present.
    pub fn is_complete(&self) -> bool {
        !self.origin_code.is_empty()
            && !self.destination_code.is_empty()
            && self.departure_date.is_some()
    }

    /// Names of the fields that keep the search incomplete.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.origin_code.is_empty() {
            missing.push("origin");
        }
        if self.destination_code.is_empty() {
            missing.push("destination");
        }
        if self.departure_date.is_none() {
            missing.push("date");
        }
        missing
    }

    /// Request for the flight search API, or `None` for an incomplete search.
    pub fn to_flight_request(&self, limit: u32) -> Option<FlightSearchRequest> {
        let date = self.departure_date?;
        if !self.is_complete() {
            return None;
        }
        Some(FlightSearchRequest {
            origin_sky_id: self.origin_code.clone(),
            destination_sky_id: self.destination_code.clone(),
            date: format_date(date),
            adults: self.passengers.adults(),
            childrens: self.passengers.children(),
            infants: self.passengers.infants(),
            origin_entity_id: self.origin_entity_id.clone(),
            destination_entity_id: self.destination_entity_id.clone(),
            cabin_class: self.cabin_class,
            return_date: self.return_date.map(format_date),
            limit,
        })
    }

    /// Results-page query string, in a fixed field order.
    pub fn to_query_string(&self) -> String {
        let mut pairs: Vec<(&str, String)> = vec![
            ("tripType", self.trip_type.as_str().to_string()),
            ("origin", self.origin_code.clone()),
            ("destination", self.destination_code.clone()),
            (
                "date",
                self.departure_date.map(format_date).unwrap_or_default(),
            ),
            ("adults", self.passengers.adults().to_string()),
            ("children", self.passengers.children().to_string()),
            ("infants", self.passengers.infants().to_string()),
            ("originEntityId", self.origin_entity_id.clone()),
            ("destinationEntityId", self.destination_entity_id.clone()),
            ("cabinClass", self.cabin_class.as_str().to_string()),
        ];
        if let Some(rd) = self.return_date {
            pairs.push(("returnDate", format_date(rd)));
        }
        encode_query(&pairs)
    }

    /// Parse a results-page query string.
    ///
    /// Missing or malformed values fall back to defaults (one adult, no
    /// children or infants, economy, one-way) and passenger counts are
    /// clamped. Unparsable dates are treated as absent.
    pub fn from_query_string(query: &str) -> Result<Self> {
        let pairs = decode_query(query);
        let get = |key: &str| {
            pairs
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.trim())
                .filter(|v| !v.is_empty())
        };
        let count = |key: &str| get(key).and_then(|v| v.parse::<i64>().ok());

        let adults = count("adults").unwrap_or(1).max(1);
        let children = count("children").unwrap_or(0).max(0);
        let infants = count("infants").unwrap_or(0).max(0);
        let passengers = PassengerCounts::clamped(
            u32::try_from(adults).unwrap_or(u32::MAX),
            u32::try_from(children).unwrap_or(u32::MAX),
            u32::try_from(infants).unwrap_or(u32::MAX),
        );

        let trip_type = get("tripType")
            .and_then(TripType::from_str_name)
            .unwrap_or_default();
        let cabin_class = get("cabinClass")
            .and_then(CabinClass::from_str_name)
            .unwrap_or_default();

        TripSearchParams::builder(trip_type)
            .origin_codes(get("origin").unwrap_or_default(), get("originEntityId").unwrap_or_default())
            .destination_codes(
                get("destination").unwrap_or_default(),
                get("destinationEntityId").unwrap_or_default(),
            )
            .departure_date(get("date").and_then(parse_date))
            .return_date(get("returnDate").and_then(parse_date))
            .passengers(passengers)
            .cabin_class(cabin_class)
            .build()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TripSearchParamsBuilder {
    trip_type: TripType,
    origin_code: String,
    destination_code: String,
    origin_entity_id: String,
    destination_entity_id: String,
    departure_date: Option<NaiveDate>,
    return_date: Option<NaiveDate>,
    passengers: PassengerCounts,
    cabin_class: CabinClass,
}

impl TripSearchParamsBuilder {
    /// Use a resolved airport, or clear the origin when `None`.
    pub fn origin(self, airport: Option<&AirportCandidate>) -> Self {
        match airport {
            Some(a) => self.origin_codes(&a.iata_code, &a.id),
            None => self.origin_codes("", ""),
        }
    }

    pub fn destination(self, airport: Option<&AirportCandidate>) -> Self {
        match airport {
            Some(a) => self.destination_codes(&a.iata_code, &a.id),
            None => self.destination_codes("", ""),
        }
    }

    pub fn origin_codes(mut self, sky_id: &str, entity_id: &str) -> Self {
        self.origin_code = sky_id.to_string();
        self.origin_entity_id = entity_id.to_string();
        self
    }

    pub fn destination_codes(mut self, sky_id: &str, entity_id: &str) -> Self {
        self.destination_code = sky_id.to_string();
        self.destination_entity_id = entity_id.to_string();
        self
    }

    pub fn departure_date(mut self, date: Option<NaiveDate>) -> Self {
        self.departure_date = date;
        self
    }

    pub fn return_date(mut self, date: Option<NaiveDate>) -> Self {
        self.return_date = date;
        self
    }

    pub fn passengers(mut self, passengers: PassengerCounts) -> Self {
        self.passengers = passengers;
        self
    }

    pub fn cabin_class(mut self, cabin_class: CabinClass) -> Self {
        self.cabin_class = cabin_class;
        self
    }

    /// The return date is kept only for round trips.
    pub fn build(self) -> Result<TripSearchParams> {
        let return_date = match self.trip_type {
            TripType::RoundTrip => self.return_date,
            TripType::OneWay => None,
        };
        if let (Some(depart), Some(ret)) = (self.departure_date, return_date) {
            ensure!(
                ret >= depart,
                "Return date {} is before departure date {}",
                ret,
                depart
            );
        }
        ensure!(self.passengers.is_valid(), "Invalid passenger counts");

        Ok(TripSearchParams {
            trip_type: self.trip_type,
            origin_code: self.origin_code,
            destination_code: self.destination_code,
            origin_entity_id: self.origin_entity_id,
            destination_entity_id: self.destination_entity_id,
            departure_date: self.departure_date,
            return_date,
            passengers: self.passengers,
            cabin_class: self.cabin_class,
        })
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

pub(crate) fn encode_query(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn decode_query(query: &str) -> Vec<(String, String)> {
    let decode = |s: &str| {
        let spaced = s.replace('+', " ");
        urlencoding::decode(&spaced)
            .map(|c| c.into_owned())
            .unwrap_or(spaced)
    };
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(part), String::new()),
        })
        .collect()
}
