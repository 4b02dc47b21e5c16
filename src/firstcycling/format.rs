//! Text summaries
//!
//! Shared by the CLI commands and the MCP tools so both print the same thing.

use std::fmt::Write as _;

use crate::firstcycling::parser::TableDiagnostics;
use crate::firstcycling::types::{
    RaceResults, ResultsTable, RiderId, RiderProfile, RiderResults, RiderSearchHit,
    RiderYearDetails, Row, SearchResults,
};

/// Rows shown by default
pub const DEFAULT_LIMIT: usize = 10;

const SEPARATOR: &str = "-----------------------";

/// Recent results block used by the `get_rider_info` tool
pub fn format_rider_info(rider_id: RiderId, results: &RiderResults) -> String {
    if results.table.is_empty() {
        return format!(
            "No results found for rider ID {}. This rider ID may not exist.",
            rider_id
        );
    }

    let mut text = String::from("Recent results:\n\n");
    for row in results.table.iter().take(DEFAULT_LIMIT) {
        let _ = writeln!(text, "Date: {}", row.get_or("Date", "Unknown date"));
        let _ = writeln!(text, "Position: {}", row.get_or("Pos", "Unknown position"));
        let _ = writeln!(text, "Race: {}", row.get_or("Race", "Unknown race"));
        let _ = writeln!(text, "Category: {}", row.get_or("CAT", "Unknown category"));
        let _ = writeln!(text, "{}", SEPARATOR);
    }
    text
}

/// Numbered best results: `1. 1. Milano-Sanremo (1.UWT) - 2 - ita`
pub fn format_best_results(results: &RiderResults) -> String {
    if results.table.is_empty() {
        return "No best results found for this rider.".to_string();
    }

    let mut text = format!("Found {} best results:\n\n", results.table.len());
    let _ = writeln!(text, "Top {} best results:", DEFAULT_LIMIT);
    for (i, row) in results.table.iter().take(DEFAULT_LIMIT).enumerate() {
        let mut line = format!(
            "{}. {}. {}",
            i + 1,
            row.get_or("Pos", "N/A"),
            row.get_or("Race", "Unknown Race")
        );
        if let Some(cat) = row.non_empty("CAT") {
            let _ = write!(line, " ({})", cat);
        }
        if let Some(editions) = row.non_empty("Editions") {
            let _ = write!(line, " - {}", editions);
        }
        if let Some(country) = row.non_empty("Race_Country") {
            let _ = write!(line, " - {}", country);
        }
        let _ = writeln!(text, "{}", line);
    }
    text
}

/// Year of a victory row, from `Year` or the formatted date
fn victory_year(row: &Row<'_>) -> String {
    row.non_empty("Year")
        .map(str::to_string)
        .or_else(|| {
            row.non_empty("Date_Formatted")
                .and_then(|d| d.get(..4))
                .map(str::to_string)
        })
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Victory counts per year and category, then the ten most recent wins
pub fn format_victories(results: &RiderResults) -> String {
    let table = &results.table;
    if table.is_empty() {
        return "No victories found for this rider.".to_string();
    }

    let mut text = format!("Found {} career victories:\n", table.len());

    let mut by_year: Vec<(String, usize)> = Vec::new();
    for row in table.iter() {
        let year = victory_year(&row);
        match by_year.iter_mut().find(|(y, _)| *y == year) {
            Some((_, n)) => *n += 1,
            None => by_year.push((year, 1)),
        }
    }
    by_year.sort_by(|a, b| a.0.cmp(&b.0));

    text.push_str("\nVictories by year:\n");
    for (year, count) in &by_year {
        let _ = writeln!(text, "{}: {} wins", year, count);
    }

    if table.has_column("CAT") {
        let mut categories = table.value_counts("CAT");
        categories.sort_by(|a, b| b.1.cmp(&a.1));
        text.push_str("\nVictories by category:\n");
        for (category, count) in &categories {
            let _ = writeln!(text, "{}: {}", category, count);
        }
    }

    if table.has_column("Date_Formatted") {
        let mut recent: Vec<_> = table.iter().collect();
        recent.sort_by(|a, b| {
            b.get_or("Date_Formatted", "")
                .cmp(a.get_or("Date_Formatted", ""))
        });

        let _ = writeln!(text, "\nMost recent {} victories:", DEFAULT_LIMIT);
        for row in recent.into_iter().take(DEFAULT_LIMIT) {
            let _ = writeln!(
                text,
                "{}: {} ({})",
                row.get_or("Date_Formatted", ""),
                row.get_or("Race", "Unknown Race"),
                row.get_or("CAT", "")
            );
        }
    }

    text
}

fn format_year_details(details: &RiderYearDetails) -> String {
    let mut text = String::new();
    if let Some(team) = &details.team {
        let _ = write!(text, "Team: {}", team);
        if let Some(division) = &details.division {
            let _ = write!(text, " ({})", division);
        }
        text.push('\n');
    }
    if let Some(ranking) = details.uci_ranking {
        let _ = write!(text, "UCI Ranking: {}", ranking);
        if let Some(points) = details.uci_points {
            let _ = write!(text, " ({} pts)", points);
        }
        text.push('\n');
    }
    if let Some(wins) = details.uci_wins {
        let _ = writeln!(text, "UCI Wins: {}", wins);
    }
    if let Some(days) = details.race_days {
        let _ = writeln!(text, "Race days: {}", days);
    }
    if let Some(distance) = details.distance_km {
        let _ = writeln!(text, "Distance: {} km", distance);
    }
    text
}

/// Any rider listing as a titled table
pub fn format_rider_listing(results: &RiderResults, limit: usize) -> String {
    let mut text = format!("Rider {} {}\n", results.rider_id, results.kind.label());

    if let Some(team) = &results.header.current_team {
        let _ = writeln!(text, "Current team: {}", team);
    }
    if let Some(details) = &results.year_details {
        text.push_str(&format_year_details(details));
    }
    text.push('\n');

    if results.table.is_empty() {
        let _ = writeln!(text, "No {} found for this rider.", results.kind.label());
        return text;
    }

    text.push_str(&format_table(&results.table, limit));
    text
}

/// Generic table rendering: one `column: value | ...` line per row
pub fn format_table(table: &ResultsTable, limit: usize) -> String {
    if table.is_empty() {
        return "No data.\n".to_string();
    }

    let mut text = String::new();
    for row in table.iter().take(limit) {
        let line = table
            .columns
            .iter()
            .zip(row.cells())
            .filter(|(column, value)| !value.is_empty() && !column.starts_with("Unnamed: "))
            .map(|(column, value)| format!("{}: {}", column, value))
            .collect::<Vec<_>>()
            .join(" | ");
        let _ = writeln!(text, "{}", line);
    }
    if table.len() > limit {
        let _ = writeln!(text, "... and {} more rows", table.len() - limit);
    }
    text
}

/// Podium-style listing: `1. Rider (Team) Time`
pub fn format_race_results(results: &RaceResults, limit: usize) -> String {
    let title = results
        .title
        .clone()
        .unwrap_or_else(|| format!("Race {} {}", results.race_id, results.year));

    if results.table.is_empty() {
        return format!("{}\n\nNo results found for this edition.", title);
    }

    let mut text = format!("{}\n\n", title);
    for (i, row) in results.table.iter().take(limit).enumerate() {
        let position = row
            .non_empty("Pos")
            .map(str::to_string)
            .unwrap_or_else(|| (i + 1).to_string());
        let mut line = format!("{}. {}", position, row.get_or("Rider", "Unknown rider"));
        if let Some(team) = row.non_empty("Team") {
            let _ = write!(line, " ({})", team);
        }
        if let Some(time) = row.non_empty("Time") {
            let _ = write!(line, " {}", time);
        }
        let _ = writeln!(text, "{}", line);
    }
    if results.table.len() > limit {
        let _ = writeln!(text, "... and {} more riders", results.table.len() - limit);
    }
    text
}

pub fn format_profile(profile: &RiderProfile) -> String {
    let mut text = format!("Rider ID: {}\n", profile.id);
    if let Some(name) = &profile.name {
        let _ = writeln!(text, "Name: {}", name);
    }
    for (key, value) in &profile.facts {
        let _ = writeln!(text, "{}: {}", key.replace('_', " "), value);
    }
    text
}

fn rider_hit_block(text: &mut String, hit: &RiderSearchHit) {
    let _ = writeln!(text, "ID: {}", hit.id);
    let _ = writeln!(text, "Name: {}", hit.name);
    let _ = writeln!(text, "Nationality: {}", hit.nationality.as_deref().unwrap_or(""));
    let _ = writeln!(text, "Team: {}", hit.team.as_deref().unwrap_or(""));
}

/// Fuzzy search hits, best first
pub fn format_rider_hits(query: &str, hits: &[RiderSearchHit], limit: usize) -> String {
    if hits.is_empty() {
        return format!("No riders found matching '{}'.", query);
    }

    let mut text = format!("Found {} riders matching '{}':\n", hits.len(), query);
    for (i, hit) in hits.iter().take(limit).enumerate() {
        let _ = writeln!(text, "\nResult #{}:", i + 1);
        rider_hit_block(&mut text, hit);
    }
    if hits.len() > limit {
        let _ = writeln!(text, "\n... and {} more results", hits.len() - limit);
    }
    text
}

/// Riders and races from the search page
pub fn format_search_results(query: &str, results: &SearchResults) -> String {
    if results.riders.is_empty() && results.races.is_empty() {
        return format!("Nothing found for '{}'.", query);
    }

    let mut text = format!("Search results for '{}':\n", query);
    let _ = writeln!(text, "\nRiders ({}):", results.riders.len());
    for hit in &results.riders {
        let mut line = format!("- {} (ID: {})", hit.name, hit.id);
        if let Some(nationality) = &hit.nationality {
            let _ = write!(line, " [{}]", nationality);
        }
        if let Some(team) = &hit.team {
            let _ = write!(line, " - {}", team);
        }
        let _ = writeln!(text, "{}", line);
    }

    let _ = writeln!(text, "\nRaces ({}):", results.races.len());
    for hit in &results.races {
        let mut line = format!("- {} (ID: {})", hit.name, hit.id);
        if let Some(country) = &hit.country {
            let _ = write!(line, " [{}]", country);
        }
        let _ = writeln!(text, "{}", line);
    }
    text
}

/// Debug dump of a fetched page's tables
pub fn format_diagnostics(url: &str, diagnostics: &TableDiagnostics) -> String {
    let mut text = format!("Checking URL: {}\n", url);
    let _ = writeln!(
        text,
        "Found {} tables matching '{}'",
        diagnostics.table_count, diagnostics.selector
    );

    if diagnostics.table_count == 0 {
        return text;
    }

    let _ = writeln!(text, "First table has {} rows", diagnostics.first_table_rows);
    if diagnostics.first_table_rows <= 1 {
        text.push_str("Table appears to be empty or has only a header row\n");
        return text;
    }

    text.push_str("Table content preview:\n");
    for (i, row) in diagnostics.preview.iter().enumerate() {
        let _ = writeln!(text, "Row {}: {}", i, row);
    }

    match diagnostics.parsed_shape {
        Some((rows, columns)) => {
            let _ = writeln!(text, "Parsed table with shape: ({}, {})", rows, columns);
            let _ = writeln!(text, "Column names: {:?}", diagnostics.parsed_columns);
        }
        None => text.push_str("Parsed table has no data rows\n"),
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firstcycling::types::{HeaderDetails, RaceId, RiderEndpointKind};

    fn results(kind: RiderEndpointKind, columns: &[&str], rows: &[&[&str]]) -> RiderResults {
        RiderResults {
            rider_id: RiderId(16672),
            kind,
            years_active: vec![],
            header: HeaderDetails::default(),
            year_details: None,
            table: ResultsTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: rows
                    .iter()
                    .map(|r| r.iter().map(|c| c.to_string()).collect())
                    .collect(),
            },
        }
    }

    #[test]
    fn test_rider_info_empty() {
        let r = results(RiderEndpointKind::YearResults, &[], &[]);
        assert_eq!(
            format_rider_info(RiderId(99), &r),
            "No results found for rider ID 99. This rider ID may not exist."
        );
    }

    #[test]
    fn test_rider_info_blocks() {
        let r = results(
            RiderEndpointKind::YearResults,
            &["Date", "Pos", "Race", "CAT"],
            &[&["26.02", "1", "Jaén", "1.1"], &["04.03", "", "Strade Bianche", "1.UWT"]],
        );
        let text = format_rider_info(RiderId(16973), &r);
        assert!(text.starts_with("Recent results:\n\n"));
        assert!(text.contains("Date: 26.02\nPosition: 1\nRace: Jaén\nCategory: 1.1\n"));
        assert!(text.contains("Position: Unknown position"));
        assert_eq!(text.matches(SEPARATOR).count(), 2);
    }

    #[test]
    fn test_best_results_line() {
        let r = results(
            RiderEndpointKind::BestResults,
            &["Pos", "Race", "CAT", "Editions", "Race_Country"],
            &[&["1", "Milano-Sanremo", "1.UWT", "2", "ita"], &["2", "Worlds", "", "", ""]],
        );
        let text = format_best_results(&r);
        assert!(text.starts_with("Found 2 best results:"));
        assert!(text.contains("1. 1. Milano-Sanremo (1.UWT) - 2 - ita\n"));
        assert!(text.contains("2. 2. Worlds\n"));
    }

    #[test]
    fn test_victories_summary() {
        let r = results(
            RiderEndpointKind::Victories,
            &["Year", "Date", "Date_Formatted", "Race", "CAT"],
            &[
                &["2022", "03.04", "2022-04-03", "Ronde", "1.UWT"],
                &["2023", "18.03", "2023-03-18", "Milano-Sanremo", "1.UWT"],
                &["2023", "09.04", "2023-04-09", "Paris-Roubaix", "1.UWT"],
                &["2023", "05.08", "2023-08-05", "Worlds", "WC"],
            ],
        );
        let text = format_victories(&r);
        assert!(text.starts_with("Found 4 career victories:"));
        assert!(text.contains("2022: 1 wins\n2023: 3 wins\n"));
        assert!(text.contains("1.UWT: 3\nWC: 1\n"));

        let recent = text.split("Most recent 10 victories:\n").nth(1).unwrap();
        assert!(recent.starts_with("2023-08-05: Worlds (WC)\n2023-04-09: Paris-Roubaix (1.UWT)"));
    }

    #[test]
    fn test_empty_messages() {
        let r = results(RiderEndpointKind::Victories, &[], &[]);
        assert_eq!(format_victories(&r), "No victories found for this rider.");
        assert_eq!(format_best_results(&r), "No best results found for this rider.");
        assert!(format_rider_listing(&r, 5).contains("No victories found"));
    }

    #[test]
    fn test_format_table_limit() {
        let table = ResultsTable {
            columns: vec!["Pos".into(), "Unnamed: 1".into(), "Race".into()],
            rows: (1..=4)
                .map(|i| vec![i.to_string(), "x".into(), format!("Race {}", i)])
                .collect(),
        };
        let text = format_table(&table, 2);
        assert!(text.starts_with("Pos: 1 | Race: Race 1\nPos: 2 | Race: Race 2\n"));
        assert!(text.contains("... and 2 more rows"));
    }

    #[test]
    fn test_race_results() {
        let race = RaceResults {
            race_id: RaceId(17),
            year: 2023,
            title: None,
            table: ResultsTable {
                columns: vec!["Pos".into(), "Rider".into(), "Team".into(), "Time".into()],
                rows: vec![vec![
                    "1".into(),
                    "Vingegaard Jonas".into(),
                    "Jumbo-Visma".into(),
                    "82:05:42".into(),
                ]],
            },
        };
        let text = format_race_results(&race, 10);
        assert!(text.starts_with("Race 17 2023\n\n"));
        assert!(text.contains("1. Vingegaard Jonas (Jumbo-Visma) 82:05:42"));
    }

    #[test]
    fn test_diagnostics_header_only() {
        let diagnostics = TableDiagnostics {
            selector: "table.tablesorter".into(),
            table_count: 1,
            first_table_rows: 1,
            ..Default::default()
        };
        let text = format_diagnostics("https://firstcycling.com/rider.php?r=1&high=1", &diagnostics);
        assert!(text.contains("Found 1 tables matching 'table.tablesorter'"));
        assert!(text.contains("only a header row"));
    }
}
