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

//! API credentials for the Sky Scrapper service.

use crate::error::ConfigError;

pub const API_KEY_VAR: &str = "SKY_API_KEY";
pub const API_BASE_URL_VAR: &str = "SKY_API_BASE_URL";
pub const API_HOST_VAR: &str = "SKY_API_HOST";

#[derive(Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub host: String,
}

// Keep the key out of logs.
impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("host", &self.host)
            .finish()
    }
}

impl ApiConfig {
    pub fn new(api_key: String, base_url: String, host: String) -> Result<Self, ConfigError> {
        let config = Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            host,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the three variables through `lookup` (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        Self::new(read(API_KEY_VAR)?, read(API_BASE_URL_VAR)?, read(API_HOST_VAR)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            (API_KEY_VAR, &self.api_key),
            (API_BASE_URL_VAR, &self.base_url),
            (API_HOST_VAR, &self.host),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_reads_all_variables() {
        let env = env_of(&[
            (API_KEY_VAR, "secret"),
            (API_BASE_URL_VAR, "https://sky-scrapper.p.rapidapi.com/api/"),
            (API_HOST_VAR, "sky-scrapper.p.rapidapi.com"),
        ]);
        let config = ApiConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.base_url, "https://sky-scrapper.p.rapidapi.com/api");
        assert!(!format!("{:?}", config).contains("secret"));
    }

    #[test]
    fn test_names_the_missing_variable() {
        let env = env_of(&[(API_KEY_VAR, "secret"), (API_BASE_URL_VAR, "https://x")]);
        let err = ApiConfig::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Environment variable SKY_API_HOST is not defined"
        );
    }

    #[test]
    fn test_blank_values_are_missing() {
        let err = ApiConfig::new(" ".into(), "https://x".into(), "h".into()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(API_KEY_VAR)));
    }
}
