//! Rider pages
//!
//! Every rider listing is a variation of `rider.php?r=<id>` with different
//! query flags. Each one is fetched, its results table parsed, and the
//! page chrome (years active, current team) collected alongside.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use scraper::Html;

use crate::error::{ParseError, Result};
use crate::firstcycling::client::{FirstCyclingClient, Page, RiderQuery};
use crate::firstcycling::parser::{
    element_text, find_results_table, parse_date, parse_header_details, parse_table,
    parse_year_details, parse_years_active, sel,
};
use crate::firstcycling::types::{
    RaceId, ResultsTable, RiderEndpointKind, RiderId, RiderProfile, RiderResults,
};

/// Column order for victories tables
const VICTORY_COLUMNS: [&str; 5] = ["Year", "Date", "Date_Formatted", "Race", "CAT"];

impl RiderQuery {
    /// Season results; `None` lets the site pick the latest season
    pub fn year_results(year: Option<i32>) -> Self {
        Self {
            year,
            ..Default::default()
        }
    }

    pub fn best_results() -> Self {
        Self {
            high: true,
            ..Default::default()
        }
    }

    pub fn victories(world_tour: bool, uci: bool) -> Self {
        Self {
            high: true,
            kind: Some(1),
            world_tour,
            uci,
            ..Default::default()
        }
    }

    pub fn grand_tours() -> Self {
        Self {
            high: true,
            kind: Some(2),
            ..Default::default()
        }
    }

    pub fn monuments() -> Self {
        Self {
            high: true,
            kind: Some(3),
            ..Default::default()
        }
    }

    pub fn team_and_ranking() -> Self {
        Self {
            stats: true,
            ..Default::default()
        }
    }

    /// History at one race, or at all UCI races when `race` is `None`
    pub fn race_history(race: Option<RaceId>) -> Self {
        match race {
            Some(race) => Self {
                race: Some(race),
                ..Default::default()
            },
            None => Self {
                stats: true,
                kind: Some(1),
                ..Default::default()
            },
        }
    }

    pub fn one_day_races() -> Self {
        Self {
            stats: true,
            kind: Some(2),
            ..Default::default()
        }
    }

    pub fn stage_races() -> Self {
        Self {
            stats: true,
            kind: Some(3),
            ..Default::default()
        }
    }

    pub fn teams() -> Self {
        Self {
            teams: true,
            ..Default::default()
        }
    }
}

/// Parse any rider listing page
pub fn parse_rider_page(rider_id: RiderId, kind: RiderEndpointKind, html: &str) -> RiderResults {
    let document = Html::parse_document(html);

    let table = match find_results_table(&document) {
        Some(table) => parse_table(&table),
        None => {
            tracing::debug!(rider = %rider_id, kind = kind.label(), "no results table on page");
            ResultsTable::empty()
        }
    };

    let table = if kind == RiderEndpointKind::Victories {
        match normalize_victories(table) {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(rider = %rider_id, "could not parse victories table: {}", e);
                ResultsTable::empty()
            }
        }
    } else {
        table
    };

    let year_details = if kind == RiderEndpointKind::YearResults {
        parse_year_details(&document)
    } else {
        None
    };

    RiderResults {
        rider_id,
        kind,
        years_active: parse_years_active(&document),
        header: parse_header_details(&document),
        year_details,
        table,
    }
}

/// Clean up a victories table.
///
/// The site prints the year and the day/month under two `Date` headers and
/// leaves an unnamed spacer column. This renames them to `Year` and `Date`,
/// drops spacers, adds a sortable `Date_Formatted` (`YYYY-MM-DD`) and puts
/// the well-known columns first.
pub fn normalize_victories(mut table: ResultsTable) -> std::result::Result<ResultsTable, ParseError> {
    if table.is_empty() {
        return Ok(ResultsTable::empty());
    }

    if !table.has_column("Race") {
        return Err(ParseError::UnexpectedStructure {
            message: format!("victories table has no Race column: {:?}", table.columns),
        });
    }

    if table.has_column("Date.1") {
        table.rename_column("Date", "Year");
        table.rename_column("Date.1", "Date");
    }

    let spacers: Vec<String> = table
        .columns
        .iter()
        .filter(|c| c.starts_with("Unnamed: "))
        .cloned()
        .collect();
    for spacer in spacers {
        table.drop_column(&spacer);
    }

    if !table.has_column("Date_Formatted") && (table.has_column("Year") || table.has_column("Date")) {
        table.push_column("Date_Formatted", |row| {
            format_victory_date(row.non_empty("Year"), row.non_empty("Date"))
        });
    }

    table.reorder_front(&VICTORY_COLUMNS);
    Ok(table)
}

/// `YYYY-MM-DD` from a year and a `DD.MM` day. Falls back to January 1st.
pub fn format_victory_date(year: Option<&str>, date: Option<&str>) -> String {
    if let Some(full) = date.and_then(parse_date) {
        return full.format("%Y-%m-%d").to_string();
    }

    let Some(year) = year.and_then(|y| y.trim().parse::<i32>().ok()) else {
        return String::new();
    };

    let day_month = date.and_then(|d| {
        let (day, month) = d.trim().split_once('.')?;
        let day: u32 = day.trim().parse().ok()?;
        let month: u32 = month.trim().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    });

    match day_month {
        Some(d) => d.format("%Y-%m-%d").to_string(),
        None => format!("{:04}-01-01", year),
    }
}

/// Parse the rider's name and info block
pub fn parse_profile(rider_id: RiderId, html: &str) -> RiderProfile {
    let document = Html::parse_document(html);
    let h1_selector = sel("h1");
    let info_selector = sel("div.left p");

    let name = document
        .select(&h1_selector)
        .next()
        .map(|h1| element_text(&h1))
        .filter(|n| !n.is_empty());

    let mut facts = BTreeMap::new();
    if let Some(info) = document.select(&info_selector).next() {
        let text = info.text().collect::<Vec<_>>().join("\n");
        for line in text.lines() {
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim().to_lowercase().replace(' ', "_");
                if key.is_empty() {
                    continue;
                }
                facts.insert(key, value.trim().to_string());
            }
        }
    }

    RiderProfile {
        id: rider_id.0,
        name,
        facts,
    }
}

/// Rider operations for one rider ID
pub struct RiderClient<'a> {
    client: &'a FirstCyclingClient,
    rider_id: RiderId,
}

impl<'a> RiderClient<'a> {
    pub fn new(client: &'a FirstCyclingClient, rider_id: RiderId) -> Self {
        Self { client, rider_id }
    }

    pub fn rider_id(&self) -> RiderId {
        self.rider_id
    }

    /// Fetch a rider page without parsing it
    pub async fn page(&self, query: &RiderQuery) -> Result<Page> {
        self.client.rider_page(self.rider_id, query).await
    }

    async fn listing(&self, kind: RiderEndpointKind, query: RiderQuery) -> Result<RiderResults> {
        let page = self.page(&query).await?;
        let results = parse_rider_page(self.rider_id, kind, &page.html);
        tracing::debug!(
            rider = %self.rider_id,
            kind = kind.label(),
            rows = results.table.len(),
            "parsed rider page"
        );
        Ok(results)
    }

    /// Results and season details for a year (latest season when `None`)
    pub async fn year_results(&self, year: Option<i32>) -> Result<RiderResults> {
        self.listing(RiderEndpointKind::YearResults, RiderQuery::year_results(year))
            .await
    }

    pub async fn best_results(&self) -> Result<RiderResults> {
        self.listing(RiderEndpointKind::BestResults, RiderQuery::best_results())
            .await
    }

    /// Career victories, optionally limited to World Tour or UCI races
    pub async fn victories(&self, world_tour: bool, uci: bool) -> Result<RiderResults> {
        self.listing(
            RiderEndpointKind::Victories,
            RiderQuery::victories(world_tour, uci),
        )
        .await
    }

    pub async fn grand_tour_results(&self) -> Result<RiderResults> {
        self.listing(RiderEndpointKind::GrandTours, RiderQuery::grand_tours())
            .await
    }

    pub async fn monument_results(&self) -> Result<RiderResults> {
        self.listing(RiderEndpointKind::Monuments, RiderQuery::monuments())
            .await
    }

    pub async fn team_and_ranking(&self) -> Result<RiderResults> {
        self.listing(
            RiderEndpointKind::TeamAndRanking,
            RiderQuery::team_and_ranking(),
        )
        .await
    }

    pub async fn race_history(&self, race: Option<RaceId>) -> Result<RiderResults> {
        self.listing(RiderEndpointKind::RaceHistory, RiderQuery::race_history(race))
            .await
    }

    pub async fn one_day_races(&self) -> Result<RiderResults> {
        self.listing(RiderEndpointKind::OneDayRaces, RiderQuery::one_day_races())
            .await
    }

    pub async fn stage_races(&self) -> Result<RiderResults> {
        self.listing(RiderEndpointKind::StageRaces, RiderQuery::stage_races())
            .await
    }

    pub async fn teams(&self) -> Result<RiderResults> {
        self.listing(RiderEndpointKind::Teams, RiderQuery::teams())
            .await
    }

    /// Name and basic facts from the main rider page
    pub async fn profile(&self) -> Result<RiderProfile> {
        let page = self.page(&RiderQuery::default()).await?;
        Ok(parse_profile(self.rider_id, &page.html))
    }
}
