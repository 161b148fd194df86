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

//! # Passenger Counter
//!
//! Side-effect free passenger count state machine.
//!
//! Invariants held after every transition:
//! - `1 <= adults <= 9`
//! - `adults + children <= 9`
//! - `infants <= adults`
//!
//! Transitions that would break an invariant are no-ops and report `false`.

use serde::{Deserialize, Serialize};

/// Seats that can be booked in a single search (infants travel on a lap).
pub const MAX_SEATED_PASSENGERS: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassengerKind {
    Adult,
    Child,
    Infant,
}

impl PassengerKind {
    pub const ALL: [PassengerKind; 3] = [Self::Adult, Self::Child, Self::Infant];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Adult => "Adults",
            Self::Child => "Children",
            Self::Infant => "Infants",
        }
    }

    pub fn helper_text(&self) -> Option<&'static str> {
        match self {
            Self::Adult => None,
            Self::Child => Some("2-11 years old"),
            Self::Infant => Some("Under 2 years"),
        }
    }
}

/// Counts as they arrive on the wire, before clamping.
#[derive(Deserialize)]
struct RawPassengerCounts {
    #[serde(default)]
    adults: u32,
    #[serde(default)]
    children: u32,
    #[serde(default)]
    infants: u32,
}

impl From<RawPassengerCounts> for PassengerCounts {
    fn from(raw: RawPassengerCounts) -> Self {
        Self::clamped(raw.adults, raw.children, raw.infants)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawPassengerCounts")]
pub struct PassengerCounts {
    adults: u32,
    children: u32,
    infants: u32,
}

impl Default for PassengerCounts {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            infants: 0,
        }
    }
}

impl PassengerCounts {
    /// Build counts from untrusted values, clamping each field into the invariants.
    ///
    /// Adults are clamped first, then children against the remaining seats,
    /// then infants against adults.
    pub fn clamped(adults: u32, children: u32, infants: u32) -> Self {
        let adults = adults.clamp(1, MAX_SEATED_PASSENGERS);
        let children = children.min(MAX_SEATED_PASSENGERS - adults);
        let infants = infants.min(adults);
        Self {
            adults,
            children,
            infants,
        }
    }

    pub fn adults(&self) -> u32 {
        self.adults
    }

    pub fn children(&self) -> u32 {
        self.children
    }

    pub fn infants(&self) -> u32 {
        self.infants
    }

    pub fn get(&self, kind: PassengerKind) -> u32 {
        match kind {
            PassengerKind::Adult => self.adults,
            PassengerKind::Child => self.children,
            PassengerKind::Infant => self.infants,
        }
    }

    pub fn total(&self) -> u32 {
        self.adults
            .saturating_add(self.children)
            .saturating_add(self.infants)
    }

    /// "1 Passenger" / "3 Passengers"
    pub fn summary(&self) -> String {
        let total = self.total();
        if total == 1 {
            "1 Passenger".to_string()
        } else {
            format!("{} Passengers", total)
        }
    }

    pub fn can_increment(&self, kind: PassengerKind) -> bool {
        match kind {
            PassengerKind::Adult => self.adults < MAX_SEATED_PASSENGERS,
            PassengerKind::Child => {
                self.adults.saturating_add(self.children) < MAX_SEATED_PASSENGERS
            }
            PassengerKind::Infant => self.infants < self.adults,
        }
    }

    pub fn can_decrement(&self, kind: PassengerKind) -> bool {
        match kind {
            PassengerKind::Adult => self.adults > 1,
            PassengerKind::Child => self.children > 0,
            PassengerKind::Infant => self.infants > 0,
        }
    }

    /// Returns `true` if the count changed.
    pub fn increment(&mut self, kind: PassengerKind) -> bool {
        if !self.can_increment(kind) {
            tracing::trace!("increment({:?}) rejected at {:?}", kind, self);
            return false;
        }
        match kind {
            PassengerKind::Adult => self.adults += 1,
            PassengerKind::Child => self.children += 1,
            PassengerKind::Infant => self.infants += 1,
        }
        true
    }

    /// Returns `true` if the count changed.
    ///
    /// Removing an adult drops infants down to the new adult count.
    pub fn decrement(&mut self, kind: PassengerKind) -> bool {
        if !self.can_decrement(kind) {
            tracing::trace!("decrement({:?}) rejected at {:?}", kind, self);
            return false;
        }
        let mut next = *self;
        match kind {
            PassengerKind::Adult => {
                next.adults -= 1;
                next.infants = next.infants.min(next.adults);
            }
            PassengerKind::Child => next.children -= 1,
            PassengerKind::Infant => next.infants -= 1,
        }
        *self = next;
        true
    }

    pub fn is_valid(&self) -> bool {
        (1..=MAX_SEATED_PASSENGERS).contains(&self.adults)
            && self.adults.saturating_add(self.children) <= MAX_SEATED_PASSENGERS
            && self.infants <= self.adults
    }
}
