//! FirstCycling data types
//!
//! Request-scoped values scraped from the site. Nothing here is persisted.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Site ID of a rider (`rider.php?r=<id>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiderId(pub u32);

/// Site ID of a race (`race.php?r=<id>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaceId(pub u32);

impl fmt::Display for RiderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parsed HTML table. Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultsTable {
    /// A table with no columns and no rows, the "no data" state
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Borrowing view of one row
    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|cells| Row {
            columns: &self.columns,
            cells,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |cells| Row {
            columns: &self.columns,
            cells,
        })
    }

    /// Append a column, filling each row from `values`
    pub fn push_column<F>(&mut self, name: impl Into<String>, mut values: F)
    where
        F: FnMut(Row<'_>) -> String,
    {
        let new_cells: Vec<String> = self.iter().map(&mut values).collect();
        self.columns.push(name.into());
        for (row, cell) in self.rows.iter_mut().zip(new_cells) {
            row.push(cell);
        }
    }

    /// Remove a column by name. Returns false if it was absent.
    pub fn drop_column(&mut self, name: &str) -> bool {
        match self.column_index(name) {
            Some(idx) => {
                self.columns.remove(idx);
                for row in &mut self.rows {
                    if idx < row.len() {
                        row.remove(idx);
                    }
                }
                true
            }
            None => false,
        }
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.columns[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Move the named columns (those present) to the front, keeping the rest in order
    pub fn reorder_front(&mut self, front: &[&str]) {
        let mut order: Vec<usize> = front
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect();
        for idx in 0..self.columns.len() {
            if !order.contains(&idx) {
                order.push(idx);
            }
        }

        self.columns = order.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            *row = order
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default())
                .collect();
        }
    }

    /// Count rows per distinct value of a column, in first-seen order
    pub fn value_counts(&self, column: &str) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for row in self.iter() {
            let value = row.get(column).unwrap_or_default().to_string();
            match counts.iter_mut().find(|(v, _)| *v == value) {
                Some((_, n)) => *n += 1,
                None => counts.push((value, 1)),
            }
        }
        counts
    }
}

/// A row of a [`ResultsTable`] addressed by column name
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    cells: &'a [String],
}

impl<'a> Row<'a> {
    /// Cell value for a column, `None` if the column does not exist
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.cells.get(idx).map(String::as_str)
    }

    /// Cell value, treating empty cells as missing
    pub fn non_empty(&self, column: &str) -> Option<&'a str> {
        self.get(column).filter(|v| !v.is_empty())
    }

    /// Cell value or a fallback
    pub fn get_or(&self, column: &str, fallback: &'a str) -> &'a str {
        self.non_empty(column).unwrap_or(fallback)
    }

    pub fn cells(&self) -> &'a [String] {
        self.cells
    }
}

/// Details from the top of every rider page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderDetails {
    pub current_team: Option<String>,
    pub twitter_handle: Option<String>,
}

/// Rider details specific to one season
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiderYearDetails {
    pub team: Option<String>,
    pub team_id: Option<u32>,
    pub team_country: Option<String>,
    pub division: Option<String>,
    pub uci_ranking: Option<u32>,
    pub uci_points: Option<f64>,
    pub uci_wins: Option<u32>,
    pub race_days: Option<u32>,
    pub distance_km: Option<u32>,
}

/// Which rider listing a page came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiderEndpointKind {
    YearResults,
    BestResults,
    Victories,
    GrandTours,
    Monuments,
    TeamAndRanking,
    RaceHistory,
    OneDayRaces,
    StageRaces,
    Teams,
}

impl RiderEndpointKind {
    /// Human label used in summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::YearResults => "results",
            Self::BestResults => "best results",
            Self::Victories => "victories",
            Self::GrandTours => "grand tour results",
            Self::Monuments => "monument results",
            Self::TeamAndRanking => "teams and rankings",
            Self::RaceHistory => "race history",
            Self::OneDayRaces => "one-day race results",
            Self::StageRaces => "stage race results",
            Self::Teams => "teams",
        }
    }

    /// Tables counted by the `--debug` dump for this listing
    pub fn debug_table_selector(&self) -> &'static str {
        match self {
            Self::Victories => "table.sortTabell.tablesorter",
            _ => "table.tablesorter",
        }
    }
}

/// One scraped rider listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderResults {
    pub rider_id: RiderId,
    pub kind: RiderEndpointKind,
    pub years_active: Vec<i32>,
    pub header: HeaderDetails,
    /// Only filled for season pages
    pub year_details: Option<RiderYearDetails>,
    pub table: ResultsTable,
}

/// Basic rider profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiderProfile {
    pub id: u32,
    pub name: Option<String>,
    /// `key: value` facts, keys lowercased with underscores
    pub facts: BTreeMap<String, String>,
}

/// Results of one race edition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResults {
    pub race_id: RaceId,
    pub year: i32,
    pub title: Option<String>,
    pub table: ResultsTable,
}

/// Rider row from the search page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderSearchHit {
    pub id: u32,
    pub name: String,
    pub nationality: Option<String>,
    pub team: Option<String>,
}

/// Race row from the search page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSearchHit {
    pub id: u32,
    pub name: String,
    pub country: Option<String>,
}

/// Everything the search page returned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub riders: Vec<RiderSearchHit>,
    pub races: Vec<RaceSearchHit>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultsTable {
        ResultsTable {
            columns: vec!["Year".into(), "Race".into(), "CAT".into()],
            rows: vec![
                vec!["2023".into(), "Milano-Sanremo".into(), "1.UWT".into()],
                vec!["2023".into(), "Paris-Roubaix".into(), "1.UWT".into()],
                vec!["2022".into(), "Tour of Flanders".into(), "1.UWT".into()],
            ],
        }
    }

    #[test]
    fn test_row_access() {
        let table = sample();
        let row = table.row(1).unwrap();
        assert_eq!(row.get("Race"), Some("Paris-Roubaix"));
        assert_eq!(row.get("Missing"), None);
        assert_eq!(row.get_or("Missing", "n/a"), "n/a");
    }

    #[test]
    fn test_value_counts_keep_first_seen_order() {
        let counts = sample().value_counts("Year");
        assert_eq!(counts, vec![("2023".to_string(), 2), ("2022".to_string(), 1)]);
    }

    #[test]
    fn test_reorder_and_drop() {
        let mut table = sample();
        table.reorder_front(&["CAT", "Nope"]);
        assert_eq!(table.columns, vec!["CAT", "Year", "Race"]);
        assert_eq!(table.rows[0][0], "1.UWT");

        assert!(table.drop_column("Year"));
        assert!(!table.drop_column("Year"));
        assert_eq!(table.rows[2], vec!["1.UWT", "Tour of Flanders"]);
    }

    #[test]
    fn test_push_column() {
        let mut table = sample();
        table.push_column("Upper", |row| row.get("Race").unwrap_or_default().to_uppercase());
        assert_eq!(table.row(0).unwrap().get("Upper"), Some("MILANO-SANREMO"));
    }
}
