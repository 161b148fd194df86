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

//! MCP server integration tests using subprocess with stdio transport.

#![cfg(feature = "mcp")]


use anyhow::{Context, Result};
use chrono::{Months, NaiveDate};
use mcp_helpers::{
    TIMEOUT, find_binary, mcp_initialize, read_response, send, spawn_stdio_server,
    stream_stderr_to_console,
};
use serde_json::{Value, json};
use std::sync::Once;
use tokio::io::BufReader;
use tokio::process::Command;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_thread_ids(true)
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
            .with_writer(std::io::stderr)
            .with_env_filter(EnvFilter::new("debug"))
            .init();
    });
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[tokio::test]
async fn test_mcp_server_starts_stdio() -> Result<()> {
    init_tracing();
    let mut child = spawn_stdio_server()?;
    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let stderr = child.stderr.take().unwrap();
    let mut stdin = child.stdin.take().unwrap();
    let stderr_task = tokio::spawn(stream_stderr_to_console(stderr));

    let resp = mcp_initialize(&mut stdin, &mut stdout)
        .await
        .context("MCP initialize failed")?;
    assert_eq!(resp["jsonrpc"], "2.0");
    assert!(resp["result"]["capabilities"]["tools"].is_object());

    drop(stdin);
    let _ = tokio::time::timeout(Duration::from_secs(2), stderr_task).await;
    drop(child);
    Ok(())
}

#[tokio::test]
async fn test_mcp_lists_both_tools() -> Result<()> {
    init_tracing();
    let mut child = spawn_stdio_server()?;
    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let mut stdin = child.stdin.take().unwrap();

    mcp_initialize(&mut stdin, &mut stdout).await?;
    send(
        &mut stdin,
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list", "params": {}}),
    )
    .await?;
    let resp = read_response(&mut stdout, 2, TIMEOUT).await?;

    let tools = resp["result"]["tools"]
        .as_array()
        .context("tools/list should return an array")?;
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert!(names.contains(&"search_airports"), "tools: {:?}", names);
    assert!(names.contains(&"search_flights"), "tools: {:?}", names);

    let flights = tools
        .iter()
        .find(|t| t["name"] == "search_flights")
        .context("search_flights tool")?;
    let required: Vec<&str> = flights["inputSchema"]["required"]
        .as_array()
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    for field in ["from", "to", "date"] {
        assert!(required.contains(&field), "{} should be required", field);
    }

    drop(stdin);
    drop(child);
    Ok(())
}

#[tokio::test]
async fn test_mcp_short_airport_query_returns_no_candidates() -> Result<()> {
    init_tracing();
    let mut child = spawn_stdio_server()?;
    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let mut stdin = child.stdin.take().unwrap();

    mcp_initialize(&mut stdin, &mut stdout).await?;
    send(
        &mut stdin,
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "search_airports", "arguments": {"query": "L"}}
        }),
    )
    .await?;
    let resp = read_response(&mut stdout, 3, TIMEOUT).await?;

    let text = resp["result"]["content"][0]["text"]
        .as_str()
        .context("tool result should be text")?;
    let inner: Value = serde_json::from_str(text)?;
    assert_eq!(inner["query"], "L");
    assert_eq!(inner["airports"], json!([]));

    drop(stdin);
    drop(child);
    Ok(())
}

#[tokio::test]
async fn test_mcp_help_output() -> Result<()> {
    let output = Command::new(find_binary()).arg("--help").output().await?;

    assert!(output.status.success(), "Help should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("waypoint-travel-mcp"),
        "Help should show binary name"
    );
    assert!(stdout.contains("stdio"), "Help should show stdio command");
    assert!(stdout.contains("http"), "Help should show http command");
    Ok(())
}

/// Run with: cargo test --test t_mcp_stdio -- --include-ignored
/// (needs SKY_API_KEY, SKY_API_BASE_URL and SKY_API_HOST)
#[tokio::test]
#[ignore]
async fn test_mcp_search_flights_live() -> Result<()> {
    init_tracing();
    let mut child = spawn_stdio_server()?;
    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let mut stdin = child.stdin.take().unwrap();

    mcp_initialize(&mut stdin, &mut stdout).await?;

    let depart = today() + Months::new(2);
    let args = json!({
        "from": "JFK",
        "to": "LHR",
        "date": depart.format("%Y-%m-%d").to_string(),
        "return_date": (depart + chrono::Duration::days(7)).format("%Y-%m-%d").to_string(),
        "cabin_class": "economy",
        "adults": 2,
        "children": 1
    });
    send(
        &mut stdin,
        json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": {"name": "search_flights", "arguments": args}
        }),
    )
    .await?;
    let resp = read_response(&mut stdout, 4, Duration::from_secs(60)).await?;
    drop(stdin);
    drop(child);

    if resp.get("error").is_some() {
        anyhow::bail!("MCP error: {}", resp["error"]);
    }
    let text = resp["result"]["content"][0]["text"]
        .as_str()
        .context("tool result should be text")?;
    let inner: Value = serde_json::from_str(text).context("Failed to parse inner JSON")?;
    println!("{}", serde_json::to_string_pretty(&inner)?);

    assert!(
        inner["results_query"]
            .as_str()
            .is_some_and(|q| q.starts_with("tripType=roundTrip&origin=JFK"))
    );
    assert_eq!(inner["passengers"], "3 Passengers");
    Ok(())
}
