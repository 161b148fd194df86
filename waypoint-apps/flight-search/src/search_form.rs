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

//! # Search Form
//!
//! Single owner of the form state. All mutation goes through `&mut self`
//! methods; rejected edits leave the state untouched and return `false`.

use anyhow::{Result, ensure};
use chrono::NaiveDate;

use crate::airports::AirportCandidate;
use crate::passengers::{PassengerCounts, PassengerKind};
use crate::search_params::{CabinClass, TripSearchParams, TripType};

/// Free text plus the airport picked from the suggestions, if any.
///
/// Typing clears the selection; only a selection resolves the field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AirportField {
    text: String,
    selected: Option<AirportCandidate>,
}

impl AirportField {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn selected(&self) -> Option<&AirportCandidate> {
        self.selected.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.selected.is_some()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.selected = None;
    }

    pub fn select(&mut self, airport: AirportCandidate) {
        self.text = airport.display_label();
        self.selected = Some(airport);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchForm {
    today: NaiveDate,
    trip_type: TripType,
    origin: AirportField,
    destination: AirportField,
    departure_date: Option<NaiveDate>,
    return_date: Option<NaiveDate>,
    passengers: PassengerCounts,
    cabin_class: CabinClass,
}

impl SearchForm {
    /// Empty form. Dates before `today` cannot be picked.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            trip_type: TripType::default(),
            origin: AirportField::default(),
            destination: AirportField::default(),
            departure_date: None,
            return_date: None,
            passengers: PassengerCounts::default(),
            cabin_class: CabinClass::default(),
        }
    }

    /// Form pre-filled from a previous search, as shown above its results.
    ///
    /// The airport text shows the code. An airport whose code and entity id
    /// are both known is restored as a selection.
    pub fn from_params(params: &TripSearchParams, today: NaiveDate) -> Self {
        let restore = |code: &str, entity_id: &str| {
            let mut field = AirportField::default();
            if !code.is_empty() && !entity_id.is_empty() {
                field.selected = Some(AirportCandidate {
                    id: entity_id.to_string(),
                    name: code.to_string(),
                    city_name: code.to_string(),
                    country_name: String::new(),
                    iata_code: code.to_string(),
                });
            }
            field.text = code.to_string();
            field
        };

        Self {
            today,
            trip_type: params.trip_type(),
            origin: restore(params.origin_code(), params.origin_entity_id()),
            destination: restore(params.destination_code(), params.destination_entity_id()),
            departure_date: params.departure_date(),
            return_date: params.return_date(),
            passengers: params.passengers(),
            cabin_class: params.cabin_class(),
        }
    }

    pub fn trip_type(&self) -> TripType {
        self.trip_type
    }

    pub fn set_trip_type(&mut self, trip_type: TripType) {
        self.trip_type = trip_type;
    }

    pub fn origin(&self) -> &AirportField {
        &self.origin
    }

    pub fn origin_mut(&mut self) -> &mut AirportField {
        &mut self.origin
    }

    pub fn destination(&self) -> &AirportField {
        &self.destination
    }

    pub fn destination_mut(&mut self) -> &mut AirportField {
        &mut self.destination
    }

    pub fn departure_date(&self) -> Option<NaiveDate> {
        self.departure_date
    }

    pub fn return_date(&self) -> Option<NaiveDate> {
        self.return_date
    }

    /// Earliest date the return picker accepts.
    pub fn min_return_date(&self) -> NaiveDate {
        self.departure_date
            .map_or(self.today, |depart| depart.max(self.today))
    }

    /// Past dates are rejected. A return date that would now precede the
    /// departure is cleared.
    pub fn set_departure_date(&mut self, date: Option<NaiveDate>) -> bool {
        if let Some(d) = date
            && d < self.today
        {
            tracing::debug!("departure date {} rejected (before {})", d, self.today);
            return false;
        }
        self.departure_date = date;
        if let (Some(depart), Some(ret)) = (self.departure_date, self.return_date)
            && ret < depart
        {
            self.return_date = None;
        }
        true
    }

    /// Dates before [`Self::min_return_date`] are rejected.
    pub fn set_return_date(&mut self, date: Option<NaiveDate>) -> bool {
        if let Some(d) = date
            && d < self.min_return_date()
        {
            tracing::debug!(
                "return date {} rejected (before {})",
                d,
                self.min_return_date()
            );
            return false;
        }
        self.return_date = date;
        true
    }

    /// Set both trip dates at once, for callers that receive them together.
    ///
    /// The return date is only applied to round trips. Errors name the
    /// rejected date and leave the form unchanged.
    pub fn set_trip_dates(
        &mut self,
        departure: NaiveDate,
        return_date: Option<NaiveDate>,
    ) -> Result<()> {
        let mut next = self.clone();
        ensure!(
            next.set_departure_date(Some(departure)),
            "Departure date {} is in the past",
            departure
        );
        if next.trip_type == TripType::RoundTrip {
            ensure!(
                next.set_return_date(return_date),
                "Return date must be on or after {}",
                next.min_return_date()
            );
        }
        *self = next;
        Ok(())
    }

    pub fn passengers(&self) -> PassengerCounts {
        self.passengers
    }

    pub fn increment_passenger(&mut self, kind: PassengerKind) -> bool {
        self.passengers.increment(kind)
    }

    pub fn decrement_passenger(&mut self, kind: PassengerKind) -> bool {
        self.passengers.decrement(kind)
    }

    pub fn set_passengers(&mut self, passengers: PassengerCounts) {
        self.passengers = passengers;
    }

    pub fn cabin_class(&self) -> CabinClass {
        self.cabin_class
    }

    pub fn set_cabin_class(&mut self, cabin_class: CabinClass) {
        self.cabin_class = cabin_class;
    }

    /// Snapshot the form into search parameters.
    ///
    /// Unresolved airports produce empty codes; the results stage reports
    /// those searches as incomplete.
    pub fn submit(&self) -> Result<TripSearchParams> {
        let params = TripSearchParams::builder(self.trip_type)
            .origin(self.origin.selected())
            .destination(self.destination.selected())
            .departure_date(self.departure_date)
            .return_date(self.return_date)
            .passengers(self.passengers)
            .cabin_class(self.cabin_class)
            .build()?;
        tracing::debug!("submitted search: {}", params.to_query_string());
        Ok(params)
    }
}
