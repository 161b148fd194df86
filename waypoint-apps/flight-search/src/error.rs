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

use thiserror::Error;

/// Failure reported by (or while talking to) the flight data API.
///
/// `status` follows the API convention: 400 when the API answered with
/// `status: false`, 500 for transport and decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub status: u16,
}

impl ApiError {
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    pub fn airports_rejected() -> Self {
        Self::new("Failed to fetch airports", 400)
    }

    pub fn flights_rejected() -> Self {
        Self::new("Failed to fetch flights", 400)
    }

    pub fn network() -> Self {
        Self::new("Network error occurred", 500)
    }

    /// Recover an `ApiError` from an `anyhow` chain, or fall back to a network error.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<ApiError>())
            .cloned()
            .unwrap_or_else(Self::network)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is not defined")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_from_anyhow_finds_api_error_in_chain() {
        let err: anyhow::Result<()> = Err(ApiError::flights_rejected()).context("searching LHR");
        let api = ApiError::from_anyhow(&err.unwrap_err());
        assert_eq!(api, ApiError::flights_rejected());
    }

    #[test]
    fn test_from_anyhow_defaults_to_network() {
        let api = ApiError::from_anyhow(&anyhow::anyhow!("connection reset"));
        assert_eq!(api.status, 500);
        assert_eq!(api.to_string(), "Network error occurred");
    }
}
