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

//! Airport lookup caching, deduplication and failure behavior against an
//! in-memory airport source. Time is paused so cache expiry is exact.

mod fakes;

use fakes::{FakeAirports, airport, lhr};
use std::sync::Arc;
use std::time::Duration;
use waypoint_flight_search::{AIRPORT_CACHE_TTL, AirportLookup, ApiError};

fn lookup_over(fake: &Arc<FakeAirports>) -> AirportLookup {
    AirportLookup::new(fake.clone())
}

#[tokio::test(start_paused = true)]
async fn test_single_char_query_never_calls_api() {
    let fake = Arc::new(FakeAirports::new());
    let lookup = lookup_over(&fake);

    for q in ["", "N", "é"] {
        let got = lookup.lookup(q).await.unwrap();
        assert!(got.is_empty(), "{:?} should yield no candidates", q);
    }
    assert_eq!(fake.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_one_call_per_freshness_window() {
    let fake = Arc::new(FakeAirports::new());
    let lookup = lookup_over(&fake);

    let first = lookup.lookup("NYC").await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    let second = lookup.lookup("NYC").await.unwrap();
    tokio::time::sleep(AIRPORT_CACHE_TTL - Duration::from_secs(120)).await;
    let third = lookup.lookup("NYC").await.unwrap();

    assert_eq!(fake.call_count(), 1);
    assert_eq!(first, second);
    assert_eq!(second, third);

    tokio::time::sleep(Duration::from_secs(61)).await;
    lookup.lookup("NYC").await.unwrap();
    assert_eq!(fake.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cache_is_keyed_by_exact_query() {
    let fake = Arc::new(FakeAirports::new());
    let lookup = lookup_over(&fake);

    lookup.lookup("NYC").await.unwrap();
    lookup.lookup("nyc").await.unwrap();
    lookup.lookup("NYC").await.unwrap();

    assert_eq!(fake.calls(), vec!["NYC".to_string(), "nyc".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_surfaced_and_not_cached() {
    let fake = Arc::new(FakeAirports::new());
    let lookup = lookup_over(&fake);

    fake.set_failing(true);
    let err = lookup.lookup("Paris").await.unwrap_err();
    assert_eq!(err, ApiError::airports_rejected());
    assert_eq!(err.status, 400);
    assert_eq!(fake.call_count(), 1, "airport lookups are never retried");

    fake.set_failing(false);
    let got = lookup.lookup("Paris").await.unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(fake.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_same_query_shares_one_call() {
    let fake = Arc::new(FakeAirports::new().with_delay("London", Duration::from_secs(1)));
    let lookup = Arc::new(lookup_over(&fake));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let lookup = lookup.clone();
            tokio::spawn(async move { lookup.lookup("London").await })
        })
        .collect();
    for h in handles {
        let got = h.await.unwrap().unwrap();
        assert_eq!(got.len(), 1);
    }

    assert_eq!(fake.call_count(), 1);
    assert_eq!(lookup.pending_lookups(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_lookups_leave_nothing_pending() {
    let fake = Arc::new(
        FakeAirports::new()
            .with_delay("Ber", Duration::from_secs(5))
            .with_delay("Berl", Duration::from_secs(5))
            .with_delay("Berli", Duration::from_secs(5)),
    );
    let lookup = lookup_over(&fake);

    for q in ["Ber", "Berl", "Berli"] {
        let timed_out = tokio::time::timeout(Duration::from_secs(1), lookup.lookup(q)).await;
        assert!(timed_out.is_err(), "{:?} should still be in flight", q);
    }
    assert_eq!(fake.call_count(), 3);
    assert_eq!(lookup.pending_lookups(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_waiter_keeps_sharing_intact() {
    let fake = Arc::new(FakeAirports::new().with_delay("Rome", Duration::from_secs(5)));
    let lookup = Arc::new(lookup_over(&fake));

    let first = {
        let lookup = lookup.clone();
        tokio::spawn(async move { lookup.lookup("Rome").await })
    };
    tokio::task::yield_now().await;

    let waiter = tokio::time::timeout(Duration::from_secs(1), lookup.lookup("Rome")).await;
    assert!(waiter.is_err());
    assert_eq!(lookup.pending_lookups(), 1);

    let late = lookup.lookup("Rome").await.unwrap();
    let first = first.await.unwrap().unwrap();
    assert_eq!(first, late);
    assert_eq!(fake.call_count(), 1);
    assert_eq!(lookup.pending_lookups(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_different_queries_do_not_wait_on_each_other() {
    let fake = Arc::new(FakeAirports::new().with_delay("Lon", Duration::from_secs(30)));
    let lookup = Arc::new(lookup_over(&fake));

    let slow = {
        let lookup = lookup.clone();
        tokio::spawn(async move { lookup.lookup("Lon").await })
    };
    tokio::task::yield_now().await;

    let started = tokio::time::Instant::now();
    lookup.lookup("London").await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!slow.is_finished());

    slow.await.unwrap().unwrap();
    assert_eq!(fake.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_resolve_prefers_exact_code() {
    let fake = Arc::new(FakeAirports::new().with_answer(
        "LHR",
        vec![
            airport("LOND", "27544008", "London", "London (Any)"),
            lhr(),
        ],
    ));
    let lookup = lookup_over(&fake);

    let picked = lookup.resolve("lhr ").await.unwrap();
    // "lhr " is trimmed but the cache key is case-sensitive
    assert_eq!(fake.calls(), vec!["lhr".to_string()]);
    assert!(picked.is_some());

    let picked = lookup.resolve("LHR").await.unwrap().unwrap();
    assert_eq!(picked.iata_code, "LHR");
    assert_eq!(picked.id, "95565050");
}

#[tokio::test(start_paused = true)]
async fn test_resolve_falls_back_to_first_candidate() {
    let fake = Arc::new(FakeAirports::new().with_answer(
        "London",
        vec![
            airport("LOND", "27544008", "London", "London (Any)"),
            lhr(),
        ],
    ));
    let lookup = lookup_over(&fake);

    let picked = lookup.resolve("London").await.unwrap().unwrap();
    assert_eq!(picked.iata_code, "LOND");

    let none = AirportLookup::new(Arc::new(FakeAirports::new().with_answer("Zz", vec![])));
    assert_eq!(none.resolve("Zz").await.unwrap(), None);
}
