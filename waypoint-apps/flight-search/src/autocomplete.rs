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

//! # Airport autocomplete
//!
//! Raw keystrokes go through a [`Debouncer`]; every stabilized query starts
//! a lookup tagged with a generation number. A lookup only publishes if its
//! generation is still the active one, so a slow answer for an old query
//! never replaces the suggestions of a newer one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::airports::{AirportLookup, Candidates, MIN_QUERY_CHARS};
use crate::debounce::{AIRPORT_INPUT_QUIESCENCE, Debouncer};
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq)]
pub enum SuggestionState {
    /// Nothing to show (empty or too-short query).
    Idle,
    Loading { query: String },
    Ready { query: String, airports: Candidates },
    Failed { query: String, error: ApiError },
}

impl SuggestionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn airports(&self) -> &[crate::airports::AirportCandidate] {
        match self {
            Self::Ready { airports, .. } => airports,
            _ => &[],
        }
    }
}

pub struct AirportAutocomplete {
    debouncer: Debouncer<String>,
    state: Arc<watch::Sender<SuggestionState>>,
    active: Arc<AtomicU64>,
    driver: JoinHandle<()>,
}

impl AirportAutocomplete {
    /// Must be called from within a tokio runtime.
    pub fn new(lookup: Arc<AirportLookup>) -> Self {
        Self::with_quiescence(lookup, AIRPORT_INPUT_QUIESCENCE)
    }

    pub fn with_quiescence(lookup: Arc<AirportLookup>, quiescence: Duration) -> Self {
        let debouncer = Debouncer::new(String::new(), quiescence);
        let (tx, _rx) = watch::channel(SuggestionState::Idle);
        let state = Arc::new(tx);
        let active = Arc::new(AtomicU64::new(0));

        let driver = tokio::spawn(drive(
            debouncer.subscribe(),
            lookup,
            Arc::clone(&state),
            Arc::clone(&active),
        ));

        Self {
            debouncer,
            state,
            active,
            driver,
        }
    }

    /// Feed the current text of the input.
    pub fn input(&self, raw: impl Into<String>) {
        self.debouncer.push(raw.into());
    }

    pub fn subscribe(&self) -> watch::Receiver<SuggestionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SuggestionState {
        self.state.borrow().clone()
    }

    /// The stabilized query suggestions are being shown for.
    pub fn active_query(&self) -> String {
        self.debouncer.current()
    }

    pub fn generation(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for AirportAutocomplete {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive(
    mut queries: watch::Receiver<String>,
    lookup: Arc<AirportLookup>,
    state: Arc<watch::Sender<SuggestionState>>,
    active: Arc<AtomicU64>,
) {
    while queries.changed().await.is_ok() {
        let query = queries.borrow_and_update().clone();
        let generation = active.fetch_add(1, Ordering::SeqCst) + 1;

        if query.chars().count() < MIN_QUERY_CHARS {
            state.send_replace(SuggestionState::Idle);
            continue;
        }

        tracing::debug!("[autocomplete] query {:?} (generation {})", query, generation);
        state.send_replace(SuggestionState::Loading {
            query: query.clone(),
        });

        let lookup = Arc::clone(&lookup);
        let state = Arc::clone(&state);
        let active = Arc::clone(&active);
        tokio::spawn(async move {
            let next = match lookup.lookup(&query).await {
                Ok(airports) => SuggestionState::Ready {
                    query: query.clone(),
                    airports,
                },
                Err(error) => SuggestionState::Failed {
                    query: query.clone(),
                    error,
                },
            };
            let published = state.send_if_modified(|current| {
                if active.load(Ordering::SeqCst) != generation {
                    return false;
                }
                *current = next;
                true
            });
            if !published {
                tracing::debug!(
                    "[autocomplete] dropped stale result for {:?} (generation {})",
                    query,
                    generation
                );
            }
        });
    }
}
