//! Race edition results

use scraper::Html;

use crate::error::Result;
use crate::firstcycling::client::{FirstCyclingClient, Page, RaceQuery};
use crate::firstcycling::parser::{element_text, find_results_table, parse_table, sel};
use crate::firstcycling::types::{RaceId, RaceResults, ResultsTable};

/// Parse a `race.php?r=<id>&y=<year>` page
pub fn parse_race_page(race_id: RaceId, year: i32, html: &str) -> RaceResults {
    let document = Html::parse_document(html);
    let h1_selector = sel("h1");
    let results_selector = sel("table.results");

    let title = document
        .select(&h1_selector)
        .next()
        .map(|h1| element_text(&h1))
        .filter(|t| !t.is_empty());

    // Edition pages use `table.results`; overview pages fall back to the sortable table
    let table = document
        .select(&results_selector)
        .next()
        .or_else(|| find_results_table(&document))
        .map(|table| parse_table(&table))
        .unwrap_or_else(ResultsTable::empty);

    RaceResults {
        race_id,
        year,
        title,
        table,
    }
}

/// Race operations for one race ID
pub struct RaceClient<'a> {
    client: &'a FirstCyclingClient,
    race_id: RaceId,
}

impl<'a> RaceClient<'a> {
    pub fn new(client: &'a FirstCyclingClient, race_id: RaceId) -> Self {
        Self { client, race_id }
    }

    pub async fn page(&self, query: &RaceQuery) -> Result<Page> {
        self.client.race_page(self.race_id, query).await
    }

    /// Results of the `year` edition, optionally for one classification or stage
    pub async fn edition_results(
        &self,
        year: i32,
        classification: Option<u8>,
        stage: Option<u8>,
    ) -> Result<RaceResults> {
        let query = RaceQuery {
            year: Some(year),
            classification,
            stage,
        };
        let page = self.page(&query).await?;
        let results = parse_race_page(self.race_id, year, &page.html);
        tracing::debug!(
            race = %self.race_id,
            year,
            rows = results.table.len(),
            "parsed race page"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RACE_HTML: &str = r#"<html><body>
<h1>Tour de France 2023</h1>
<table class="results">
  <thead><tr><th>Pos</th><th>Rider</th><th>Team</th><th>Time</th></tr></thead>
  <tbody>
    <tr><td>1</td><td><span class="flag flag-den"></span> <a href="rider.php?r=45989">Vingegaard Jonas</a></td><td><a href="team.php?l=1">Jumbo-Visma</a></td><td>82:05:42</td></tr>
    <tr><td>2</td><td><span class="flag flag-slo"></span> <a href="rider.php?r=16973">Pogačar Tadej</a></td><td><a href="team.php?l=2">UAE Team Emirates</a></td><td>+ 07:29</td></tr>
  </tbody>
</table>
</body></html>"#;

    #[test]
    fn test_parse_race_page() {
        let results = parse_race_page(RaceId(17), 2023, RACE_HTML);
        assert_eq!(results.title.as_deref(), Some("Tour de France 2023"));
        assert_eq!(results.table.len(), 2);

        let winner = results.table.row(0).unwrap();
        assert_eq!(winner.get("Rider"), Some("Vingegaard Jonas"));
        assert_eq!(winner.get("Rider_ID"), Some("45989"));
        assert_eq!(winner.get("Rider_Country"), Some("den"));
        assert_eq!(winner.get("Team_ID"), Some("1"));
        assert_eq!(results.table.row(1).unwrap().get("Time"), Some("+ 07:29"));
    }

    #[test]
    fn test_race_page_without_results() {
        let html = r#"<h1>Tour de France 2030</h1><table class="results"><tr><td>No data</td></tr></table>"#;
        let results = parse_race_page(RaceId(17), 2030, html);
        assert!(results.table.is_empty());
        assert_eq!(results.year, 2030);
    }
}
