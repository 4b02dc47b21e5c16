//! MCP Tool definitions and handlers
//!
//! Each tool is one fetch, one parse and one formatting step. Upstream and
//! argument failures come back as error results, never as protocol errors.

use std::fmt;
use std::sync::Arc;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::firstcycling::client::FirstCyclingClient;
use crate::firstcycling::format::{
    format_best_results, format_profile, format_race_results, format_rider_hits,
    format_rider_info, format_rider_listing, format_search_results, format_victories,
    DEFAULT_LIMIT,
};
use crate::firstcycling::race::RaceClient;
use crate::firstcycling::rider::RiderClient;
use crate::firstcycling::search::SearchClient;
use crate::firstcycling::types::{RaceId, RiderEndpointKind, RiderId};
use crate::mcp::types::{CallToolResult, Tool};

/// Rows returned by listing tools unless `limit` is given
const LISTING_LIMIT: usize = 25;

/// Tool handler
pub struct ToolHandler {
    client: Arc<FirstCyclingClient>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RiderArgs {
    #[serde(alias = "rider_id", deserialize_with = "positive")]
    rider_id: u32,
    #[serde(default, deserialize_with = "positive_opt")]
    limit: Option<usize>,
}

impl ToolHandler {
    /// Create a new tool handler
    pub fn new(client: Arc<FirstCyclingClient>) -> Self {
        Self { client }
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<Tool> {
        vec![
            tool_def("get_rider_info", "Get a professional cyclist's most recent results by FirstCycling rider ID (e.g. 16973 for Tadej Pogačar)", rider_schema()),
            tool_def("get_rider_year_results", "Get a rider's results and team, ranking and race-day details for one season", rider_year_schema()),
            tool_def("get_rider_best_results", "Get a rider's best career results", rider_schema()),
            tool_def("get_rider_victories", "Get a rider's career victories with counts by year and category", rider_victories_schema()),
            tool_def("get_rider_grand_tour_results", "Get a rider's results in grand tours", rider_schema()),
            tool_def("get_rider_monument_results", "Get a rider's results in the monuments", rider_schema()),
            tool_def("get_rider_teams_and_ranking", "Get a rider's historical teams and UCI rankings", rider_schema()),
            tool_def("get_rider_race_history", "Get a rider's history at one race, or at UCI races when no race ID is given", rider_race_history_schema()),
            tool_def("get_rider_one_day_races", "Get a rider's results at major one-day races", rider_schema()),
            tool_def("get_rider_stage_races", "Get a rider's results at major stage races", rider_schema()),
            tool_def("get_rider_teams", "Get the teams a rider has ridden for", rider_schema()),
            tool_def("get_rider_profile", "Get a rider's name, nationality, date of birth and other profile facts", rider_schema()),
            tool_def("search_rider", "Find riders by name with fuzzy matching; tolerates misspellings and reordered names", search_rider_schema()),
            tool_def("search", "Search riders and races by name as listed by FirstCycling", search_schema()),
            tool_def("get_race_results", "Get results for a race edition (e.g. race 17, year 2023 for the Tour de France)", race_results_schema()),
        ]
    }

    /// Call a tool by name
    pub async fn call_tool(&self, name: &str, args: Value) -> CallToolResult {
        tracing::debug!(tool = name, "tool call");
        match name {
            "get_rider_info" => self.handle_rider_info(args).await,
            "get_rider_year_results" => self.handle_year_results(args).await,
            "get_rider_best_results" => self.handle_best_results(args).await,
            "get_rider_victories" => self.handle_victories(args).await,
            "get_rider_grand_tour_results" => self.handle_listing(args, RiderEndpointKind::GrandTours).await,
            "get_rider_monument_results" => self.handle_listing(args, RiderEndpointKind::Monuments).await,
            "get_rider_teams_and_ranking" => self.handle_listing(args, RiderEndpointKind::TeamAndRanking).await,
            "get_rider_race_history" => self.handle_race_history(args).await,
            "get_rider_one_day_races" => self.handle_listing(args, RiderEndpointKind::OneDayRaces).await,
            "get_rider_stage_races" => self.handle_listing(args, RiderEndpointKind::StageRaces).await,
            "get_rider_teams" => self.handle_listing(args, RiderEndpointKind::Teams).await,
            "get_rider_profile" => self.handle_profile(args).await,
            "search_rider" => self.handle_search_rider(args).await,
            "search" => self.handle_search(args).await,
            "get_race_results" => self.handle_race_results(args).await,
            _ => CallToolResult::error(format!("Unknown tool: {}", name)),
        }
    }

    // ==================== Tool Handlers ====================

    fn rider(&self, rider_id: u32) -> RiderClient<'_> {
        RiderClient::new(&self.client, RiderId(rider_id))
    }

    async fn handle_rider_info(&self, args: Value) -> CallToolResult {
        let args: RiderArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };

        match self.rider(args.rider_id).year_results(None).await {
            Ok(results) => CallToolResult::text(format_rider_info(RiderId(args.rider_id), &results)),
            Err(e) => CallToolResult::error(format!(
                "Error retrieving rider information for ID {}: {}. The rider ID may not exist or there might be a connection issue.",
                args.rider_id, e
            )),
        }
    }

    async fn handle_year_results(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            #[serde(alias = "rider_id", deserialize_with = "positive")]
            rider_id: u32,
            year: Option<i32>,
            #[serde(default, deserialize_with = "positive_opt")]
            limit: Option<usize>,
        }

        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };

        match self.rider(args.rider_id).year_results(args.year).await {
            Ok(results) => CallToolResult::text(format_rider_listing(
                &results,
                args.limit.unwrap_or(LISTING_LIMIT),
            )),
            Err(e) => CallToolResult::error(e.to_string()),
        }
    }

    async fn handle_best_results(&self, args: Value) -> CallToolResult {
        let args: RiderArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };

        match self.rider(args.rider_id).best_results().await {
            Ok(results) => CallToolResult::text(format!(
                "Rider ID: {}\n\n{}",
                args.rider_id,
                format_best_results(&results)
            )),
            Err(e) => CallToolResult::error(e.to_string()),
        }
    }

    async fn handle_victories(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            #[serde(alias = "rider_id", deserialize_with = "positive")]
            rider_id: u32,
            #[serde(default, alias = "world_tour")]
            world_tour: bool,
            #[serde(default)]
            uci: bool,
        }

        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };

        match self
            .rider(args.rider_id)
            .victories(args.world_tour, args.uci)
            .await
        {
            Ok(results) => CallToolResult::text(format!(
                "Rider ID: {}\n\n{}",
                args.rider_id,
                format_victories(&results)
            )),
            Err(e) => CallToolResult::error(e.to_string()),
        }
    }

    async fn handle_listing(&self, args: Value, kind: RiderEndpointKind) -> CallToolResult {
        let args: RiderArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };

        let rider = self.rider(args.rider_id);
        let results = match kind {
            RiderEndpointKind::GrandTours => rider.grand_tour_results().await,
            RiderEndpointKind::Monuments => rider.monument_results().await,
            RiderEndpointKind::TeamAndRanking => rider.team_and_ranking().await,
            RiderEndpointKind::OneDayRaces => rider.one_day_races().await,
            RiderEndpointKind::StageRaces => rider.stage_races().await,
            RiderEndpointKind::Teams => rider.teams().await,
            RiderEndpointKind::BestResults
            | RiderEndpointKind::YearResults
            | RiderEndpointKind::Victories
            | RiderEndpointKind::RaceHistory => {
                return CallToolResult::error(format!(
                    "{} is not available as a plain listing",
                    kind.label()
                ))
            }
        };

        match results {
            Ok(results) => CallToolResult::text(format_rider_listing(
                &results,
                args.limit.unwrap_or(LISTING_LIMIT),
            )),
            Err(e) => CallToolResult::error(format!(
                "Error retrieving {} for rider ID {}: {}",
                kind.label(),
                args.rider_id,
                e
            )),
        }
    }

    async fn handle_race_history(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            #[serde(alias = "rider_id", deserialize_with = "positive")]
            rider_id: u32,
            #[serde(default, alias = "race_id", deserialize_with = "positive_opt")]
            race_id: Option<u32>,
            #[serde(default, deserialize_with = "positive_opt")]
            limit: Option<usize>,
        }

        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };

        match self
            .rider(args.rider_id)
            .race_history(args.race_id.map(RaceId))
            .await
        {
            Ok(results) => CallToolResult::text(format_rider_listing(
                &results,
                args.limit.unwrap_or(LISTING_LIMIT),
            )),
            Err(e) => CallToolResult::error(e.to_string()),
        }
    }

    async fn handle_profile(&self, args: Value) -> CallToolResult {
        let args: RiderArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };

        match self.rider(args.rider_id).profile().await {
            Ok(profile) => CallToolResult::text(format_profile(&profile)),
            Err(e) => CallToolResult::error(e.to_string()),
        }
    }

    async fn handle_search_rider(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            query: String,
            #[serde(default, deserialize_with = "positive_opt")]
            limit: Option<usize>,
        }

        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };

        if args.query.trim().is_empty() {
            return CallToolResult::error("Search query must not be empty");
        }

        match SearchClient::new(&self.client)
            .search_riders(&args.query)
            .await
        {
            Ok(hits) => CallToolResult::text(format_rider_hits(
                &args.query,
                &hits,
                args.limit.unwrap_or(DEFAULT_LIMIT),
            )),
            Err(e) => CallToolResult::error(e.to_string()),
        }
    }

    async fn handle_search(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            query: String,
        }

        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };

        if args.query.trim().is_empty() {
            return CallToolResult::error("Search query must not be empty");
        }

        match SearchClient::new(&self.client).search(&args.query).await {
            Ok(results) => CallToolResult::text(format_search_results(&args.query, &results)),
            Err(e) => CallToolResult::error(e.to_string()),
        }
    }

    async fn handle_race_results(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            #[serde(alias = "race_id", deserialize_with = "positive")]
            race_id: u32,
            year: i32,
            classification: Option<u8>,
            stage: Option<u8>,
            #[serde(default, deserialize_with = "positive_opt")]
            limit: Option<usize>,
        }

        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };

        match RaceClient::new(&self.client, RaceId(args.race_id))
            .edition_results(args.year, args.classification, args.stage)
            .await
        {
            Ok(results) => CallToolResult::text(format_race_results(
                &results,
                args.limit.unwrap_or(LISTING_LIMIT),
            )),
            Err(e) => CallToolResult::error(format!(
                "Unable to fetch race results for race {} ({}): {}",
                args.race_id, args.year, e
            )),
        }
    }
}

// ==================== Helpers ====================

fn parse_args<T: DeserializeOwned>(args: Value) -> std::result::Result<T, CallToolResult> {
    serde_json::from_value(args)
        .map_err(|e| CallToolResult::error(format!("Invalid arguments: {}", e)))
}

/// Reject zero for fields whose schema declares `"minimum": 1`
fn positive<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default + PartialEq + fmt::Display,
{
    let value = T::deserialize(deserializer)?;
    if value == T::default() {
        return Err(D::Error::custom(format!("expected at least 1, got {}", value)));
    }
    Ok(value)
}

fn positive_opt<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default + PartialEq + fmt::Display,
{
    match Option::<T>::deserialize(deserializer)? {
        Some(value) if value == T::default() => Err(D::Error::custom(format!(
            "expected at least 1, got {}",
            value
        ))),
        other => Ok(other),
    }
}

fn tool_def(name: &str, description: &str, input_schema: Value) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema,
    }
}

fn rider_id_property() -> Value {
    json!({
        "type": "integer",
        "minimum": 1,
        "description": "The FirstCycling rider ID (e.g. 16672 for Mathieu van der Poel)"
    })
}

fn limit_property() -> Value {
    json!({
        "type": "integer",
        "minimum": 1,
        "description": "Maximum number of rows to return"
    })
}

fn rider_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "riderId": rider_id_property(),
            "limit": limit_property()
        },
        "required": ["riderId"]
    })
}

fn rider_year_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "riderId": rider_id_property(),
            "year": {
                "type": "integer",
                "description": "Season (defaults to the rider's latest season)"
            },
            "limit": limit_property()
        },
        "required": ["riderId"]
    })
}

fn rider_victories_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "riderId": rider_id_property(),
            "worldTour": {
                "type": "boolean",
                "description": "Only World Tour victories"
            },
            "uci": {
                "type": "boolean",
                "description": "Only UCI victories"
            }
        },
        "required": ["riderId"]
    })
}

fn rider_race_history_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "riderId": rider_id_property(),
            "raceId": {
                "type": "integer",
                "minimum": 1,
                "description": "FirstCycling race ID; omit for all UCI races"
            },
            "limit": limit_property()
        },
        "required": ["riderId"]
    })
}

fn search_rider_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Rider name, in any order, misspellings allowed"
            },
            "limit": limit_property()
        },
        "required": ["query"]
    })
}

fn search_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Rider or race name"
            }
        },
        "required": ["query"]
    })
}

fn race_results_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "raceId": {
                "type": "integer",
                "minimum": 1,
                "description": "The FirstCycling race ID (e.g. 17 for Tour de France)"
            },
            "year": {
                "type": "integer",
                "description": "Edition year (e.g. 2023)"
            },
            "classification": {
                "type": "integer",
                "description": "Classification number (site parameter k)"
            },
            "stage": {
                "type": "integer",
                "description": "Stage number (site parameter e)"
            },
            "limit": limit_property()
        },
        "required": ["raceId", "year"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn handler() -> ToolHandler {
        let config = Config::with_base_url("http://127.0.0.1:9").unwrap();
        ToolHandler::new(Arc::new(FirstCyclingClient::new(&config).unwrap()))
    }

    #[test]
    fn test_tool_names_are_unique() {
        let tools = handler().list_tools();
        let mut names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), tools.len());
    }

    #[test]
    fn test_schemas_are_objects_with_required() {
        for tool in handler().list_tools() {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
            assert!(tool.input_schema["required"].is_array(), "{}", tool.name);
        }
    }

    #[test]
    fn test_rider_args_accept_snake_case() {
        let args: RiderArgs = serde_json::from_value(json!({"rider_id": 16973})).unwrap();
        assert_eq!(args.rider_id, 16973);
        let args: RiderArgs = serde_json::from_value(json!({"riderId": 16672, "limit": 3})).unwrap();
        assert_eq!(args.limit, Some(3));
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let result = handler()
            .call_tool("get_rider_info", json!({"riderId": "abc"}))
            .await;
        assert!(result.is_error);
        assert!(result.text_content().contains("Invalid arguments"));
    }

    #[tokio::test]
    async fn test_zero_limit_and_ids_are_rejected() {
        let handler = handler();

        let result = handler
            .call_tool("get_rider_teams", json!({"riderId": 1, "limit": 0}))
            .await;
        assert!(result.is_error);
        assert!(result.text_content().contains("expected at least 1"));

        let result = handler.call_tool("get_rider_profile", json!({"riderId": 0})).await;
        assert!(result.is_error);

        let result = handler
            .call_tool("get_rider_race_history", json!({"riderId": 16672, "raceId": 0}))
            .await;
        assert!(result.is_error);

        let result = handler
            .call_tool("get_race_results", json!({"raceId": 17, "year": 2023, "limit": 0}))
            .await;
        assert!(result.is_error);
    }

    #[test]
    fn test_optional_limit_may_be_omitted() {
        let args: RiderArgs = serde_json::from_value(json!({"riderId": 16672})).unwrap();
        assert_eq!(args.limit, None);
    }

    #[tokio::test]
    async fn test_listing_refuses_dedicated_endpoints() {
        let result = handler()
            .handle_listing(json!({"riderId": 16672}), RiderEndpointKind::Victories)
            .await;
        assert!(result.is_error);
        assert!(result.text_content().contains("victories is not available as a plain listing"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let result = handler().call_tool("get_weather", json!({})).await;
        assert!(result.is_error);
        assert!(result.text_content().contains("Unknown tool: get_weather"));
    }

    #[tokio::test]
    async fn test_empty_search_query() {
        let result = handler().call_tool("search_rider", json!({"query": "  "})).await;
        assert!(result.is_error);
    }
}
