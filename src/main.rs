//! FirstCycling MCP Server - Rust Implementation
//!
//! Serves FirstCycling.com data as Model Context Protocol tools, and offers
//! a few example commands that print the same summaries to the terminal.

use std::sync::Arc;

use clap::{Parser, Subcommand};

use firstcycling_mcp::config::Config;
use firstcycling_mcp::error::Result;
use firstcycling_mcp::firstcycling::client::{FirstCyclingClient, RiderQuery};
use firstcycling_mcp::firstcycling::format::{
    format_best_results, format_diagnostics, format_race_results, format_rider_hits,
    format_rider_info, format_rider_listing, format_search_results, format_victories,
    DEFAULT_LIMIT,
};
use firstcycling_mcp::firstcycling::parser::inspect_tables;
use firstcycling_mcp::firstcycling::race::RaceClient;
use firstcycling_mcp::firstcycling::rider::RiderClient;
use firstcycling_mcp::firstcycling::search::SearchClient;
use firstcycling_mcp::firstcycling::types::{RaceId, RiderEndpointKind, RiderId};
use firstcycling_mcp::mcp::server::McpServer;

/// Mathieu van der Poel
const DEFAULT_RIDER_ID: u32 = 16672;

/// FirstCycling MCP Server
#[derive(Parser)]
#[command(name = "firstcycling-mcp")]
#[command(author, version, about = "FirstCycling MCP Server - professional cycling data over the Model Context Protocol")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdio (default)
    Serve,

    /// Print a rider's most recent results
    RiderInfo {
        /// FirstCycling rider ID
        rider_id: u32,
    },

    /// Print a rider's best career results
    BestResults {
        /// FirstCycling rider ID
        #[arg(default_value_t = DEFAULT_RIDER_ID)]
        rider_id: u32,

        /// Dump the fetched page's table structure
        #[arg(long)]
        debug: bool,
    },

    /// Print a rider's victories with per-year and per-category counts
    Victories {
        /// FirstCycling rider ID
        #[arg(default_value_t = DEFAULT_RIDER_ID)]
        rider_id: u32,

        /// Dump the fetched page's table structure
        #[arg(long)]
        debug: bool,

        /// Only World Tour victories
        #[arg(long)]
        world_tour: bool,

        /// Only UCI victories
        #[arg(long)]
        uci: bool,
    },

    /// Print a rider's results for one season
    YearResults {
        /// FirstCycling rider ID
        rider_id: u32,

        /// Season (defaults to the latest)
        #[arg(long)]
        year: Option<i32>,
    },

    /// Print results of a race edition
    RaceResults {
        /// FirstCycling race ID
        race_id: u32,

        /// Edition year
        year: i32,

        /// Classification number
        #[arg(long)]
        classification: Option<u8>,

        /// Stage number
        #[arg(long)]
        stage: Option<u8>,
    },

    /// Search riders and races by name
    Search {
        query: String,

        /// Rank riders with fuzzy name matching
        #[arg(long)]
        fuzzy: bool,
    },
}

impl Commands {
    fn debug(&self) -> bool {
        matches!(
            self,
            Commands::BestResults { debug: true, .. } | Commands::Victories { debug: true, .. }
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let debug = cli.command.as_ref().is_some_and(Commands::debug);

    // Initialize logging; stdout carries JSON-RPC in server mode
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = Config::new()?;
    let client = Arc::new(FirstCyclingClient::new(&config)?);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(client).await?,
        Commands::RiderInfo { rider_id } => {
            let results = RiderClient::new(&client, RiderId(rider_id))
                .year_results(None)
                .await?;
            println!("{}", format_rider_info(RiderId(rider_id), &results));
        }
        Commands::BestResults { rider_id, debug } => {
            let rider = RiderClient::new(&client, RiderId(rider_id));
            if debug {
                print_diagnostics(&rider, &RiderQuery::best_results(), RiderEndpointKind::BestResults)
                    .await?;
            }
            let results = rider.best_results().await?;
            println!("Rider ID: {}\n", rider_id);
            println!("{}", format_best_results(&results));
        }
        Commands::Victories {
            rider_id,
            debug,
            world_tour,
            uci,
        } => {
            let rider = RiderClient::new(&client, RiderId(rider_id));
            if debug {
                print_diagnostics(
                    &rider,
                    &RiderQuery::victories(world_tour, uci),
                    RiderEndpointKind::Victories,
                )
                .await?;
            }
            let results = rider.victories(world_tour, uci).await?;
            println!("Rider ID: {}\n", rider_id);
            println!("{}", format_victories(&results));
        }
        Commands::YearResults { rider_id, year } => {
            let results = RiderClient::new(&client, RiderId(rider_id))
                .year_results(year)
                .await?;
            println!("{}", format_rider_listing(&results, usize::MAX));
        }
        Commands::RaceResults {
            race_id,
            year,
            classification,
            stage,
        } => {
            let results = RaceClient::new(&client, RaceId(race_id))
                .edition_results(year, classification, stage)
                .await?;
            println!("{}", format_race_results(&results, usize::MAX));
        }
        Commands::Search { query, fuzzy } => {
            let search = SearchClient::new(&client);
            if fuzzy {
                let hits = search.search_riders(&query).await?;
                println!("{}", format_rider_hits(&query, &hits, DEFAULT_LIMIT));
            } else {
                let results = search.search(&query).await?;
                println!("{}", format_search_results(&query, &results));
            }
        }
    }

    Ok(())
}

async fn run_server(client: Arc<FirstCyclingClient>) -> Result<()> {
    tracing::info!(base_url = client.base_url(), "starting FirstCycling MCP server on stdio");

    let mut server = McpServer::new(client);
    server.run_stdio().await?;

    Ok(())
}

async fn print_diagnostics(
    rider: &RiderClient<'_>,
    query: &RiderQuery,
    kind: RiderEndpointKind,
) -> Result<()> {
    let page = rider.page(query).await?;
    let diagnostics = inspect_tables(&page.html, kind.debug_table_selector());
    println!("{}", format_diagnostics(&page.url, &diagnostics));
    Ok(())
}
