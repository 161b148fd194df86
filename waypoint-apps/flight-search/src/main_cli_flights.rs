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

//! CLI for airport autocomplete and flight search.

use std::cmp::max;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use waypoint_flight_search::{
    AirportCandidate, AirportLookup, ApiConfig, CabinClass, DEFAULT_QPS, DEFAULT_TIMEOUT_SECS,
    FlightResults, FlightSearchData, ItinerarySummary, PassengerCounts, SearchForm, SearchOutcome,
    SkyScrapperClient, TripSearchParams, TripType,
};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "waypoint-flights")]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Sky Scrapper API key
    #[arg(long, env = "SKY_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// API base URL (e.g., https://sky-scrapper.p.rapidapi.com/api)
    #[arg(long, env = "SKY_API_BASE_URL", global = true)]
    api_base_url: Option<String>,

    /// API host header (e.g., sky-scrapper.p.rapidapi.com)
    #[arg(long, env = "SKY_API_HOST", global = true)]
    api_host: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    timeout: u64,

    /// Maximum requests per second
    #[arg(long, default_value_t = DEFAULT_QPS, global = true)]
    qps: u32,

    /// Verbose output
    #[arg(short, long, default_value = "false", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Suggest airports matching a query (e.g., "lon", "New York")
    Airports { query: String },

    /// Search flights between two airports
    Search {
        /// Origin airport code or city (e.g., JFK, "New York")
        #[arg(short, long)]
        from: String,

        /// Destination airport code or city (e.g., LHR, London)
        #[arg(short, long)]
        to: String,

        /// Departure date (YYYY-MM-DD or YYYY/MM/DD)
        #[arg(short, long)]
        date: String,

        /// Return date for round trips (YYYY-MM-DD or YYYY/MM/DD)
        #[arg(short = 'R', long)]
        return_date: Option<String>,

        /// Cabin class: economy, premium_economy, business, first
        #[arg(short, long, default_value = "economy")]
        cabin: String,

        /// Trip type: oneway, roundtrip (defaults to roundtrip when a return date is given)
        #[arg(long)]
        trip: Option<String>,

        #[arg(short, long, default_value = "1")]
        adults: u32,

        #[arg(long, default_value = "0")]
        children: u32,

        /// Infants on lap, at most one per adult
        #[arg(long, default_value = "0")]
        infants: u32,
    },

    /// Re-run a search from a results query string
    /// (e.g., "tripType=oneWay&origin=JFK&destination=LHR&date=2026-12-01&...")
    Results { query: String },
}

/// Configure logging based on verbosity level
fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn parse_cabin(s: &str) -> Result<CabinClass> {
    match s.to_lowercase().as_str() {
        "e" => Ok(CabinClass::Economy),
        "pe" | "premium" => Ok(CabinClass::PremiumEconomy),
        "b" => Ok(CabinClass::Business),
        "f" => Ok(CabinClass::First),
        other => CabinClass::from_str_name(other).ok_or_else(|| {
            anyhow!(
                "Invalid cabin class: {}. Use: economy, premium_economy, business, first",
                s
            )
        }),
    }
}

fn parse_trip(s: &str) -> Result<TripType> {
    match s.to_lowercase().as_str() {
        "round" | "rt" => Ok(TripType::RoundTrip),
        "one" | "ow" => Ok(TripType::OneWay),
        other => TripType::from_str_name(other)
            .ok_or_else(|| anyhow!("Invalid trip type: {}. Use: roundtrip, oneway", s)),
    }
}

/// Parse date string to NaiveDate
fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .context(format!(
            "Invalid date format: {}. Use YYYY-MM-DD or YYYY/MM/DD",
            s
        ))
}

fn build_config(args: &CliArgs) -> Result<ApiConfig> {
    let config = ApiConfig::new(
        args.api_key.clone().unwrap_or_default(),
        args.api_base_url.clone().unwrap_or_default(),
        args.api_host.clone().unwrap_or_default(),
    )?;
    tracing::debug!("Using {:?}", config);
    Ok(config)
}

/// Resolve free text to an airport, or fail with a helpful message.
async fn resolve_airport(lookup: &AirportLookup, text: &str) -> Result<AirportCandidate> {
    let airport = lookup
        .resolve(text)
        .await
        .with_context(|| format!("Airport lookup for {:?} failed", text))?
        .ok_or_else(|| anyhow!("No airport matches {:?}", text))?;
    tracing::info!("{:?} -> {} [{}]", text, airport.display_label(), airport.id);
    Ok(airport)
}

/// Get terminal width for responsive tables
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(100)
}

fn dash_bar() -> String {
    "-".repeat(get_terminal_width().min(100))
}

fn render_airports(query: &str, airports: &[AirportCandidate]) {
    if airports.is_empty() {
        println!("No airports match {:?}", query);
        return;
    }
    let name_w = airports
        .iter()
        .map(|a| a.name.chars().count())
        .fold(20, max);
    println!("  {:<6}  {:<name_w$}  {:<12}  COUNTRY", "CODE", "NAME", "ENTITY ID");
    println!("{}", dash_bar());
    for a in airports {
        println!(
            "  {:<6}  {:<name_w$}  {:<12}  {}",
            a.iata_code, a.name, a.id, a.country_name
        );
    }
}

/// Calculate terminal-aware column widths
fn calc_column_widths(rows: &[ItinerarySummary]) -> (usize, usize, usize) {
    let mut carrier_w = 7;
    let mut times_w = 15;
    let mut stops_w = 8;
    for leg in rows.iter().flat_map(|r| r.legs.iter()) {
        carrier_w = max(carrier_w, leg.carrier.chars().count());
        times_w = max(times_w, leg.departure.len() + leg.arrival.len() + 5);
        stops_w = max(stops_w, leg.stops.len());
    }

    let available = get_terminal_width().saturating_sub(50);
    if carrier_w + times_w + stops_w > available && available > 30 {
        carrier_w = max(available / 3, 4);
    }
    (carrier_w, times_w, stops_w)
}

/// Render results to stdout
fn render_results(params: &TripSearchParams, data: &FlightSearchData) {
    let title_bar = format!(
        "================================================================================================\n  {} -> {} on {}  ({}, {})\n================================================================================================",
        params.origin_code(),
        params.destination_code(),
        params
            .departure_date()
            .map(waypoint_flight_search::format_date)
            .unwrap_or_default(),
        params.passengers().summary(),
        params.cabin_class().label(),
    );
    println!("{}\n", title_bar);

    if let Some(best) = data.cheapest() {
        println!("Best Price:    {}", best.price.formatted);
    }
    println!("Total Flights: {}", data.len());

    let rows: Vec<ItinerarySummary> = data.itineraries.iter().take(5).map(|i| i.summary()).collect();
    let (cw, tw, sw) = calc_column_widths(&rows);

    println!("\nTop {} Results:", rows.len());
    println!("{}", dash_bar());
    println!(
        "  {:>3}  {:<9}  {:<cw$}  {:<9}  {:<tw$}  {:<9}  {:<sw$}  PRICE",
        "#", "LEG", "AIRLINE", "ROUTE", "DEP -> ARR", "DURATION", "STOPS"
    );
    println!("{}", dash_bar());

    for (i, row) in rows.iter().enumerate() {
        for (j, leg) in row.legs.iter().enumerate() {
            let rank = if j == 0 { format!("{}", i + 1) } else { String::new() };
            let price = if j == 0 { row.price.as_str() } else { "" };
            let carrier = match &leg.flight_number {
                Some(n) => format!("{} {}", leg.carrier, n),
                None => leg.carrier.clone(),
            };
            println!(
                "  {:>3}  {:<9}  {:<cw$}  {:<9}  {:<tw$}  {:<9}  {:<sw$}  {}",
                rank,
                leg.label,
                carrier,
                leg.route,
                format!("{} -> {}", leg.departure, leg.arrival),
                leg.duration,
                leg.stops,
                price
            );
        }
    }
}

async fn run_search(client: Arc<SkyScrapperClient>, params: &TripSearchParams) -> Result<()> {
    println!("Results query: {}\n", params.to_query_string());

    let results = FlightResults::new(client);
    match results.search(params).await {
        SearchOutcome::Flights(data) if data.is_empty() => {
            println!("{}", waypoint_flight_search::NO_FLIGHTS_MESSAGE);
            Ok(())
        }
        SearchOutcome::Flights(data) => {
            render_results(params, &data);
            Ok(())
        }
        SearchOutcome::Incomplete { missing } => {
            bail!("Search is incomplete, missing: {}", missing.join(", "))
        }
        SearchOutcome::Failed(e) => Err(e).context("Search failed"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    setup_logging(args.verbose);

    tracing::info!("Starting waypoint-flights CLI");

    let config = build_config(&args)?;
    let client = Arc::new(SkyScrapperClient::new(config, args.timeout, args.qps)?);
    let lookup = AirportLookup::new(client.clone());

    match &args.command {
        Command::Airports { query } => {
            let airports = lookup.lookup(query.trim()).await.context("Airport lookup failed")?;
            render_airports(query, &airports);
        }
        Command::Search {
            from,
            to,
            date,
            return_date,
            cabin,
            trip,
            adults,
            children,
            infants,
        } => {
            let cabin = parse_cabin(cabin)?;
            let depart_date = parse_date(date)?;
            let return_date = return_date.as_deref().map(parse_date).transpose()?;
            let trip = match trip {
                Some(t) => parse_trip(t)?,
                None if return_date.is_some() => TripType::RoundTrip,
                None => TripType::OneWay,
            };
            if trip == TripType::RoundTrip && return_date.is_none() {
                tracing::warn!("Round trip selected but no return date provided");
            }

            let passengers = PassengerCounts::clamped(*adults, *children, *infants);
            if (passengers.adults(), passengers.children(), passengers.infants())
                != (*adults, *children, *infants)
            {
                tracing::warn!(
                    "Passengers adjusted to {} adult(s), {} child(ren), {} infant(s)",
                    passengers.adults(),
                    passengers.children(),
                    passengers.infants()
                );
            }

            let mut form = SearchForm::new(chrono::Local::now().date_naive());
            form.set_trip_type(trip);
            form.set_cabin_class(cabin);
            form.set_passengers(passengers);
            form.set_trip_dates(depart_date, return_date)?;

            form.origin_mut().select(resolve_airport(&lookup, from).await?);
            form.destination_mut().select(resolve_airport(&lookup, to).await?);

            let params = form
                .submit()
                .context("Failed to build search parameters")?;

            run_search(client, &params).await?;
        }
        Command::Results { query } => {
            let params = TripSearchParams::from_query_string(query)
                .context("Failed to parse results query")?;
            run_search(client, &params).await?;
        }
    }

    Ok(())
}
