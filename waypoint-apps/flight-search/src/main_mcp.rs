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

//! # Unified MCP Server Entry Point
//!
//! Supports stdio and streamable HTTP transports via subcommand.

use anyhow::{Context, Error, Result};
use clap::{Parser, Subcommand};
use rmcp::handler::server::{ServerHandler, tool::ToolRouter, wrapper::Parameters};
use rmcp::service::serve_server;
use rmcp::tool;
use rmcp::tool_router;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use waypoint_flight_search::{
    AirportCandidate, AirportLookup, ApiConfig, CabinClass, DEFAULT_QPS, DEFAULT_TIMEOUT_SECS,
    FlightResults, ItinerarySummary, NO_FLIGHTS_MESSAGE, PassengerCounts, SearchForm,
    SearchOutcome, SkyScrapperClient, TripType, parse_date,
};

#[derive(Parser, Debug)]
#[command(name = "waypoint-travel-mcp")]
#[command(
    author,
    version,
    about = "MCP server for airport autocomplete and flight search"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run MCP server over stdio (for desktop MCP clients)
    Stdio,

    /// Run MCP server over HTTP
    Http {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(long, default_value = "8080")]
        port: u16,
    },
}

#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct AirportsInput {
    pub query: String,
}

#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct FlightsInput {
    pub from: String,
    pub to: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    #[serde(default)]
    pub cabin_class: CabinClass,
    #[serde(default = "one")]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_type: Option<TripType>,
}

fn one() -> u32 {
    1
}

#[derive(Serialize)]
struct AirportsResponse<'a> {
    query: &'a str,
    airports: &'a [AirportCandidate],
}

#[derive(Serialize)]
struct FlightsResponse {
    results_query: String,
    origin: String,
    destination: String,
    passengers: String,
    total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    itineraries: Vec<ItinerarySummary>,
}

#[derive(Clone)]
pub struct TravelServer {
    lookup: Arc<AirportLookup>,
    results: Arc<FlightResults>,
    tool_router: ToolRouter<Self>,
}

impl TravelServer {
    pub fn new(client: Arc<SkyScrapperClient>) -> Self {
        Self {
            lookup: Arc::new(AirportLookup::new(client.clone())),
            results: Arc::new(FlightResults::new(client)),
            tool_router: Self::tool_router(),
        }
    }

    async fn resolve(&self, text: &str) -> Result<AirportCandidate, String> {
        self.lookup
            .resolve(text)
            .await
            .map_err(|e| format!("Airport lookup for {text:?} failed: {e}"))?
            .ok_or_else(|| format!("No airport matches {text:?}"))
    }
}

#[tool_router]
impl TravelServer {
    #[tool(
        name = "search_airports",
        description = "Suggest airports for a partial name or code. Parameters: query (at least 2 characters, e.g. 'lon', 'New York'). Returns entity id, name, city, country and code for each match."
    )]
    async fn search_airports(&self, params: Parameters<AirportsInput>) -> Result<String, String> {
        let query = params.0.query;
        let query = query.trim();
        let airports = self
            .lookup
            .lookup(query)
            .await
            .map_err(|e| format!("Airport search failed: {e}"))?;
        serde_json::to_string(&AirportsResponse {
            query,
            airports: &airports,
        })
        .map_err(|e| e.to_string())
    }

    #[tool(
        name = "search_flights",
        description = "Search flights. Parameters: from and to (airport code or city), date (YYYY-MM-DD), return_date (YYYY-MM-DD, optional), cabin_class (economy/premium_economy/business/first), adults (1-9), children, infants (at most one per adult), trip_type (oneWay/roundTrip, defaults to roundTrip when return_date is set)."
    )]
    async fn search_flights(&self, params: Parameters<FlightsInput>) -> Result<String, String> {
        let input = params.0;
        let today = chrono::Local::now().date_naive();

        let depart = parse_date(&input.date)
            .ok_or_else(|| format!("Invalid date {:?}, use YYYY-MM-DD", input.date))?;
        let return_date = match input.return_date.as_deref() {
            Some(s) => Some(
                parse_date(s).ok_or_else(|| format!("Invalid return_date {s:?}, use YYYY-MM-DD"))?,
            ),
            None => None,
        };
        let trip_type = input.trip_type.unwrap_or(if return_date.is_some() {
            TripType::RoundTrip
        } else {
            TripType::OneWay
        });

        let mut form = SearchForm::new(today);
        form.set_trip_type(trip_type);
        form.set_cabin_class(input.cabin_class);
        form.set_passengers(PassengerCounts::clamped(
            input.adults,
            input.children,
            input.infants,
        ));
        form.set_trip_dates(depart, return_date)
            .map_err(|e| format!("{e:#}"))?;

        form.origin_mut().select(self.resolve(&input.from).await?);
        form.destination_mut().select(self.resolve(&input.to).await?);

        let params = form.submit().map_err(|e| format!("{e:#}"))?;
        let data = match self.results.search(&params).await {
            SearchOutcome::Flights(data) => data,
            SearchOutcome::Failed(e) => return Err(format!("Flight search failed: {e}")),
            SearchOutcome::Incomplete { missing } => {
                return Err(format!("Missing search fields: {}", missing.join(", ")));
            }
        };

        let response = FlightsResponse {
            results_query: params.to_query_string(),
            origin: form.origin().text().to_string(),
            destination: form.destination().text().to_string(),
            passengers: params.passengers().summary(),
            total: data.len(),
            message: data.is_empty().then(|| NO_FLIGHTS_MESSAGE.to_string()),
            itineraries: data.itineraries.iter().map(|i| i.summary()).collect(),
        };
        serde_json::to_string(&response).map_err(|e| e.to_string())
    }
}

impl ServerHandler for TravelServer {
    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl Future<Output = Result<rmcp::model::ListToolsResult, rmcp::ErrorData>> + Send + '_
    {
        Box::pin(async move {
            let tools = self.tool_router.list_all();
            tracing::debug!("Returning {} tools", tools.len());
            Ok(rmcp::model::ListToolsResult::with_all_items(tools))
        })
    }

    fn call_tool(
        &self,
        request: rmcp::model::CallToolRequestParam,
        context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl Future<Output = Result<rmcp::model::CallToolResult, rmcp::ErrorData>> + Send + '_
    {
        let router = self.tool_router.clone();
        let self_clone = self.clone();
        Box::pin(async move {
            let context =
                rmcp::handler::server::tool::ToolCallContext::new(&self_clone, request, context);
            router.call(context).await
        })
    }

    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            protocol_version: rmcp::model::ProtocolVersion::V_2025_03_26,
            capabilities: rmcp::model::ServerCapabilities {
                tools: Some(rmcp::model::ToolsCapability::default()),
                ..Default::default()
            },
            server_info: rmcp::model::Implementation::from_build_env(),
            instructions: Some(
                "Use search_airports to find codes, then search_flights to list itineraries."
                    .to_string(),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".to_string().into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse();
    tracing::debug!("Parsed args: {:?}", args);

    let config = ApiConfig::from_env().context("Missing API configuration")?;
    tracing::debug!("Using {:?}", config);
    let client = Arc::new(
        SkyScrapperClient::new(config, DEFAULT_TIMEOUT_SECS, DEFAULT_QPS)
            .context("Failed to create Sky Scrapper client")?,
    );

    match args.command {
        Command::Stdio => {
            eprintln!("Starting MCP server over stdio...");
            let server = TravelServer::new(client);
            let (stdin, stdout) = rmcp::transport::io::stdio();
            let _running = serve_server(Arc::new(server), (stdin, stdout))
                .await
                .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;
            tracing::debug!("Server running. Press Ctrl+C to stop.");
            std::future::pending::<()>().await;
        }
        Command::Http { host, port } => {
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .context("Invalid host:port")?;
            tracing::info!("Starting MCP server over HTTP on {}", addr);
            let server = TravelServer::new(client);
            let session_manager = Arc::new(LocalSessionManager::default());
            let config = StreamableHttpServerConfig {
                stateful_mode: true,
                ..Default::default()
            };
            let service =
                StreamableHttpService::new(move || Ok(server.clone()), session_manager, config);
            let app = axum::Router::new().nest_service("/mcp", service);
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .context("Failed to bind to address")?;
            tracing::debug!("Listening on {}", addr);
            axum::serve(listener, app)
                .await
                .context("HTTP server error")?;
        }
    }

    Ok(())
}
