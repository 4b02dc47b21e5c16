//! Rider and race search
//!
//! Wraps `search.php` and adds fuzzy rider matching: names are compared
//! with a sequence-similarity ratio over whole names and name parts, plus a
//! phonetic (Soundex) bonus so misspellings like "pogachar" still match.

use scraper::{ElementRef, Html};

use crate::error::Result;
use crate::firstcycling::client::FirstCyclingClient;
use crate::firstcycling::parser::{element_text, flag_class_to_country, query_param, sel};
use crate::firstcycling::types::{RaceSearchHit, RiderSearchHit, SearchResults};

/// Minimum similarity for a search row to count as a match
pub const MIN_MATCH_SCORE: f64 = 0.4;

/// Score multiplier for hits found by searching a single word of the query
pub const PARTIAL_QUERY_PENALTY: f64 = 0.9;

/// Bonus when any query word and name word share a Soundex code
const SOUNDEX_BONUS: f64 = 0.4;

/// Lowercase, turn hyphens into spaces and collapse whitespace
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Simplified four-character Soundex code. Empty when `name` has no ASCII letters.
pub fn soundex(name: &str) -> String {
    let letters: Vec<char> = name
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect();

    let Some((&first, rest)) = letters.split_first() else {
        return String::new();
    };

    let digits: Vec<char> = rest
        .iter()
        .map(|&c| match c {
            'B' | 'F' | 'P' | 'V' => '1',
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => '2',
            'D' | 'T' => '3',
            'L' => '4',
            'M' | 'N' => '5',
            'R' => '6',
            other => other,
        })
        .filter(|c| !matches!(c, 'A' | 'E' | 'I' | 'O' | 'U' | 'H' | 'W' | 'Y'))
        .collect();

    let mut code = String::with_capacity(4);
    code.push(first);
    let mut previous: Option<char> = None;
    for digit in digits {
        if previous != Some(digit) {
            code.push(digit);
        }
        previous = Some(digit);
    }

    while code.len() < 4 {
        code.push('0');
    }
    code.chars().take(4).collect()
}

/// Ratcliff/Obershelp similarity: `2 * matches / (len(a) + len(b))`
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest common block in `a[alo..ahi]` and `b[blo..bhi]`, earliest on ties
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best = (alo, blo, 0);
    let width = bhi.saturating_sub(blo) + 1;
    let mut previous = vec![0usize; width];
    for i in alo..ahi {
        let mut current = vec![0usize; width];
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = previous[j - blo] + 1;
                current[j - blo + 1] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            }
        }
        previous = current;
    }
    best
}

/// Similarity between a query and a rider name, in `0.0..=1.0`.
///
/// Averages the whole-string ratio with the best ratio over name parts, so
/// "poel mathieu" matches "Mathieu van der Poel", then adds a phonetic bonus.
pub fn calculate_similarity(query: &str, name: &str) -> f64 {
    let norm_query = normalize(query);
    let norm_name = normalize(name);

    let basic = sequence_ratio(&norm_query, &norm_name);

    let query_parts: Vec<&str> = norm_query.split(' ').filter(|p| !p.is_empty()).collect();
    let name_parts: Vec<&str> = norm_name.split(' ').filter(|p| !p.is_empty()).collect();

    if query_parts.is_empty() || name_parts.is_empty() {
        return basic;
    }

    let mut best_part: f64 = 0.0;
    for q in &query_parts {
        best_part = best_part.max(sequence_ratio(q, &norm_name));
    }
    for n in &name_parts {
        best_part = best_part.max(sequence_ratio(&norm_query, n));
    }
    for q in &query_parts {
        for n in &name_parts {
            best_part = best_part.max(sequence_ratio(q, n));
        }
    }

    let phonetic_match = query_parts.iter().any(|q| {
        let q_code = soundex(q);
        !q_code.is_empty() && name_parts.iter().any(|n| soundex(n) == q_code)
    });
    let bonus = if phonetic_match { SOUNDEX_BONUS } else { 0.0 };

    ((basic + best_part) / 2.0 + bonus).min(1.0)
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn link_hit(row: &ElementRef<'_>, script: &str) -> Option<(u32, String)> {
    let link_selector = sel("a[href]");
    let link = row
        .select(&link_selector)
        .find(|a| a.value().attr("href").is_some_and(|h| h.contains(script)))?;
    let id = query_param(link.value().attr("href")?, "r")?;
    Some((id, element_text(&link)))
}

fn row_country(row: &ElementRef<'_>) -> Option<String> {
    let flag_selector = sel("span.flag");
    row.select(&flag_selector)
        .find_map(|span| flag_class_to_country(&span))
}

fn row_team(row: &ElementRef<'_>) -> Option<String> {
    let span_selector = sel("span[style]");
    row.select(&span_selector)
        .find(|s| {
            s.value()
                .attr("style")
                .is_some_and(|style| style.replace(' ', "").contains("color:grey"))
        })
        .and_then(|s| non_empty(element_text(&s)))
}

/// Parse the structured sections of the search page: rider tables
/// (`table.sortRiders`) and the race table (first `table.tablesorter`)
pub fn parse_search_page(html: &str) -> SearchResults {
    let document = Html::parse_document(html);
    let rider_tables = sel("table.sortRiders");
    let race_table = sel("table.tablesorter");
    let gender_rows = sel("tr.men, tr.women");

    let mut results = SearchResults::default();

    for table in document.select(&rider_tables) {
        for row in table.select(&gender_rows) {
            if let Some((id, name)) = link_hit(&row, "rider.php") {
                results.riders.push(RiderSearchHit {
                    id,
                    name,
                    nationality: row_country(&row),
                    team: row_team(&row),
                });
            }
        }
    }

    if let Some(table) = document.select(&race_table).next() {
        for row in table.select(&gender_rows) {
            if let Some((id, name)) = link_hit(&row, "race.php") {
                results.races.push(RaceSearchHit {
                    id,
                    name,
                    country: row_country(&row),
                });
            }
        }
    }

    results
}

/// Every table row on a page that links to a rider, in page order
pub fn parse_rider_candidates(html: &str) -> Vec<RiderSearchHit> {
    let document = Html::parse_document(html);
    let row_selector = sel("table tr");
    let cell_selector = sel("td");

    document
        .select(&row_selector)
        .filter(|row| row.select(&cell_selector).next().is_some())
        .filter_map(|row| {
            let (id, name) = link_hit(&row, "rider.php?r=")?;
            Some(RiderSearchHit {
                id,
                name,
                nationality: row_country(&row),
                team: row_team(&row),
            })
        })
        .collect()
}

/// Sort by score, best first, and keep the best-scoring hit per rider ID
pub fn rank_hits(mut scored: Vec<(RiderSearchHit, f64)>) -> Vec<RiderSearchHit> {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut unique: Vec<RiderSearchHit> = Vec::with_capacity(scored.len());
    for (hit, _) in scored {
        if !unique.iter().any(|h| h.id == hit.id) {
            unique.push(hit);
        }
    }
    unique
}

/// Search operations against `search.php`
pub struct SearchClient<'a> {
    client: &'a FirstCyclingClient,
}

impl<'a> SearchClient<'a> {
    pub fn new(client: &'a FirstCyclingClient) -> Self {
        Self { client }
    }

    /// Riders and races whose names match `query`, as listed by the site
    pub async fn search(&self, query: &str) -> Result<SearchResults> {
        let page = self.client.search_page(query).await?;
        Ok(parse_search_page(&page.html))
    }

    /// Fuzzy rider search, best match first.
    ///
    /// When the full query finds nothing and it has several words, the first
    /// and last words (at least 3 characters) are searched on their own and
    /// their hits scored against the full query with a penalty.
    pub async fn search_riders(&self, query: &str) -> Result<Vec<RiderSearchHit>> {
        let mut scored = self.scored_candidates(query).await?;

        if scored.is_empty() {
            let parts: Vec<&str> = query.split_whitespace().collect();
            if parts.len() > 1 {
                for part in [parts[0], parts[parts.len() - 1]] {
                    if part.chars().count() < 3 {
                        continue;
                    }
                    for (hit, _) in self.scored_candidates(part).await? {
                        let score = calculate_similarity(query, &hit.name) * PARTIAL_QUERY_PENALTY;
                        scored.push((hit, score));
                    }
                }
            }
        }

        tracing::debug!(query, matches = scored.len(), "rider search");
        Ok(rank_hits(scored))
    }

    async fn scored_candidates(&self, query: &str) -> Result<Vec<(RiderSearchHit, f64)>> {
        let page = self.client.search_page(query).await?;
        Ok(parse_rider_candidates(&page.html)
            .into_iter()
            .map(|hit| {
                let score = calculate_similarity(query, &hit.name);
                (hit, score)
            })
            .filter(|(_, score)| *score >= MIN_MATCH_SCORE)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_HTML: &str = r#"<html><body>
<table class="sortRiders">
  <tr><th>Rider</th><th>Team</th></tr>
  <tr class="men">
    <td><span class="flag flag-ned"></span> <a href="rider.php?r=16672">VAN DER POEL Mathieu</a></td>
    <td><span style="color:grey">Alpecin-Deceuninck</span></td>
  </tr>
  <tr class="women">
    <td><span class="flag flag-ned"></span> <a href="rider.php?r=30001">VAN DER POEL Anna</a></td>
    <td></td>
  </tr>
</table>
<table class="tablesorter">
  <tr><th>Race</th></tr>
  <tr class="men"><td><span class="flag flag-fra"></span> <a href="race.php?r=17">Tour de France</a></td></tr>
</table>
</body></html>"#;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Van-Der   POEL "), "van der poel");
    }

    #[test]
    fn test_soundex_codes() {
        assert_eq!(soundex("Robert"), "R163");
        assert_eq!(soundex("pogacar"), "P260");
        assert_eq!(soundex("pogachar"), "P260");
        assert_eq!(soundex("Lee"), "L000");
        assert_eq!(soundex("123"), "");
    }

    #[test]
    fn test_sequence_ratio() {
        assert_eq!(sequence_ratio("abcd", "abcd"), 1.0);
        assert_eq!(sequence_ratio("", ""), 1.0);
        assert_eq!(sequence_ratio("abc", "xyz"), 0.0);
        // "abcd" vs "bcde": common block "bcd" -> 2*3/8
        assert!((sequence_ratio("abcd", "bcde") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_handles_reordering_and_misspelling() {
        let exact = calculate_similarity("mathieu van der poel", "VAN DER POEL Mathieu");
        let reversed = calculate_similarity("poel mathieu", "VAN DER POEL Mathieu");
        let misspelt = calculate_similarity("pogachar", "POGAČAR Tadej");
        let unrelated = calculate_similarity("vingegaard", "ALAPHILIPPE Julian");

        assert!(exact >= MIN_MATCH_SCORE && exact <= 1.0);
        assert!(reversed >= MIN_MATCH_SCORE);
        assert!(misspelt >= MIN_MATCH_SCORE);
        assert!(unrelated < misspelt);
    }

    #[test]
    fn test_parse_search_page() {
        let results = parse_search_page(SEARCH_HTML);

        assert_eq!(results.riders.len(), 2);
        assert_eq!(results.riders[0].id, 16672);
        assert_eq!(results.riders[0].name, "VAN DER POEL Mathieu");
        assert_eq!(results.riders[0].nationality.as_deref(), Some("ned"));
        assert_eq!(results.riders[0].team.as_deref(), Some("Alpecin-Deceuninck"));
        assert_eq!(results.riders[1].team, None);

        assert_eq!(results.races.len(), 1);
        assert_eq!(results.races[0].id, 17);
        assert_eq!(results.races[0].country.as_deref(), Some("fra"));
    }

    #[test]
    fn test_parse_rider_candidates_skips_header_rows() {
        let hits = parse_rider_candidates(SEARCH_HTML);
        let ids: Vec<u32> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![16672, 30001]);
    }

    #[test]
    fn test_rank_hits_dedupes_keeping_best() {
        let hit = |id: u32, name: &str| RiderSearchHit {
            id,
            name: name.to_string(),
            nationality: None,
            team: None,
        };
        let ranked = rank_hits(vec![
            (hit(1, "A"), 0.5),
            (hit(2, "B"), 0.9),
            (hit(1, "A"), 0.7),
        ]);
        let ids: Vec<u32> = ranked.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    mod fallback {
        use super::*;
        use crate::config::Config;
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        const POGACAR_HTML: &str = r#"<html><body>
<table class="sortRiders">
  <tr class="men"><td><span class="flag flag-svn"></span> <a href="rider.php?r=16973">POGAČAR Tadej</a></td></tr>
</table>
</body></html>"#;

        async fn mount_empty_search(server: &MockServer) {
            Mock::given(method("GET"))
                .and(path("/search.php"))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
                .with_priority(10)
                .mount(server)
                .await;
        }

        fn client_for(base_url: &str) -> FirstCyclingClient {
            let config = Config::with_base_url(base_url).unwrap();
            FirstCyclingClient::new(&config).unwrap()
        }

        #[tokio::test]
        async fn test_falls_back_to_single_words() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/search.php"))
                .and(query_param("s", "xqzv pogacar"))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
                .with_priority(1)
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/search.php"))
                .and(query_param("s", "pogacar"))
                .respond_with(ResponseTemplate::new(200).set_body_string(POGACAR_HTML))
                .with_priority(1)
                .expect(1)
                .mount(&server)
                .await;
            mount_empty_search(&server).await;

            let client = client_for(&server.uri());
            let hits = SearchClient::new(&client)
                .search_riders("xqzv pogacar")
                .await
                .unwrap();

            let ids: Vec<u32> = hits.iter().map(|h| h.id).collect();
            assert_eq!(ids, vec![16973]);
        }

        #[tokio::test]
        async fn test_fallback_skips_short_words() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/search.php"))
                .and(query_param("s", "al"))
                .respond_with(ResponseTemplate::new(200).set_body_string(POGACAR_HTML))
                .with_priority(1)
                .expect(0)
                .mount(&server)
                .await;
            mount_empty_search(&server).await;

            let client = client_for(&server.uri());
            let hits = SearchClient::new(&client)
                .search_riders("xqzv al")
                .await
                .unwrap();

            assert!(hits.is_empty());
        }

        #[tokio::test]
        async fn test_direct_match_skips_fallback() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/search.php"))
                .and(query_param("s", "pogacar tadej"))
                .respond_with(ResponseTemplate::new(200).set_body_string(POGACAR_HTML))
                .with_priority(1)
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/search.php"))
                .and(query_param("s", "pogacar"))
                .respond_with(ResponseTemplate::new(200).set_body_string(POGACAR_HTML))
                .with_priority(1)
                .expect(0)
                .mount(&server)
                .await;
            mount_empty_search(&server).await;

            let client = client_for(&server.uri());
            let hits = SearchClient::new(&client)
                .search_riders("pogacar tadej")
                .await
                .unwrap();
            assert_eq!(hits.len(), 1);
        }
    }
}
