//! HTML parsing helpers for firstcycling.com pages
//!
//! The site renders most data as `<table>` markup with inconsistent classes,
//! headers and date encodings. These helpers turn a table element into a
//! [`ResultsTable`] and pull the small bits of page chrome shared by every
//! rider page.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::config::site::NO_DATA;
use crate::error::ParseError;
use crate::firstcycling::types::{HeaderDetails, ResultsTable, RiderYearDetails};

/// Build a selector from a literal
pub(crate) fn sel(css: &'static str) -> Selector {
    Selector::parse(css).expect("static CSS selector")
}

/// Candidate selectors for the main results table, most specific first
const RESULTS_TABLE_SELECTORS: [&str; 3] = [
    "table.sortTabell.tablesorter",
    "table.sortTabell",
    "table.tablesorter:not(.notOddEven)",
];

/// Collapse runs of whitespace (including non-breaking spaces) into single spaces
pub fn clean_text(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Visible text of an element; text nodes are separated so `<br>` splits words
pub fn element_text(element: &ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Numeric query parameter from a link such as `rider.php?r=16672&y=2023`
pub fn query_param(href: &str, key: &str) -> Option<u32> {
    let query = href.split_once('?')?.1;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .and_then(|(_, v)| v.trim().parse().ok())
}

/// Team ID from a `team.php?l=<id>` link
pub fn team_link_to_id(link: &ElementRef<'_>) -> Option<u32> {
    link.value()
        .attr("href")
        .filter(|href| href.contains("team.php"))
        .and_then(|href| query_param(href, "l"))
}

/// Country code from a flag image, e.g. `img/flags/16/NED.png` -> `NED`
pub fn img_to_country_code(img: &ElementRef<'_>) -> Option<String> {
    let src = img.value().attr("src")?;
    let file = src.rsplit('/').next()?;
    let code = file.split('.').next()?.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_uppercase())
    }
}

/// Country code from a flag span, e.g. `class="flag flag-ned"` -> `ned`
pub fn flag_class_to_country(span: &ElementRef<'_>) -> Option<String> {
    span.value()
        .classes()
        .find_map(|c| c.strip_prefix("flag-"))
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Twitter handle from a profile link
pub fn link_to_twitter_handle(link: &ElementRef<'_>) -> Option<String> {
    let href = link.value().attr("href")?;
    if !(href.contains("twitter.com/") || href.contains("//x.com/")) {
        return None;
    }
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|h| h.split('?').next().unwrap_or(h).trim_start_matches('@').to_string())
        .filter(|h| !h.is_empty())
}

/// Parse a `DD.MM.YYYY` date as printed by the site
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%d.%m.%Y").ok()
}

/// Locate the main results table of a page
pub fn find_results_table(document: &Html) -> Option<ElementRef<'_>> {
    RESULTS_TABLE_SELECTORS.iter().find_map(|css| {
        Selector::parse(css)
            .ok()
            .and_then(|selector| document.select(&selector).next())
    })
}

/// Whether a table only carries the site's "No data" placeholder
pub fn is_no_data(table: &ElementRef<'_>) -> bool {
    element_text(table).contains(NO_DATA)
}

fn colspan(cell: &ElementRef<'_>) -> usize {
    cell.value()
        .attr("colspan")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
}

fn row_cells<'a>(row: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "td" | "th"))
        .collect()
}

/// Header names with blanks filled and duplicates suffixed, the way the site's
/// tables are usually read: `Date, Date.1, Unnamed: 2, Race`
fn header_names(cells: &[ElementRef<'_>]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut seen: Vec<(String, usize)> = Vec::new();
    for cell in cells {
        let text = element_text(cell);
        for _ in 0..colspan(cell) {
            let base = if text.is_empty() {
                format!("Unnamed: {}", names.len())
            } else {
                text.clone()
            };
            if !names.contains(&base) {
                names.push(base);
                continue;
            }
            // Next free `base.N`; an earlier header may already use it
            let idx = match seen.iter().position(|(name, _)| *name == base) {
                Some(idx) => idx,
                None => {
                    seen.push((base.clone(), 1));
                    seen.len() - 1
                }
            };
            let count = &mut seen[idx].1;
            let mut name = format!("{}.{}", base, count);
            while names.contains(&name) {
                *count += 1;
                name = format!("{}.{}", base, count);
            }
            *count += 1;
            names.push(name);
        }
    }
    names
}

/// Identifiers and flags found in one body cell
#[derive(Default)]
struct CellLinks {
    rider_id: Option<u32>,
    team_id: Option<u32>,
    race_id: Option<u32>,
    country: Option<String>,
}

fn cell_links(cell: &ElementRef<'_>) -> CellLinks {
    let link_selector = sel("a[href]");
    let flag_span_selector = sel("span.flag");
    let img_selector = sel("img[src]");

    let mut links = CellLinks::default();
    for link in cell.select(&link_selector) {
        let href = link.value().attr("href").unwrap_or_default();
        if href.contains("rider.php") {
            links.rider_id = links.rider_id.or_else(|| query_param(href, "r"));
        } else if href.contains("team.php") {
            links.team_id = links.team_id.or_else(|| query_param(href, "l"));
        } else if href.contains("race.php") {
            links.race_id = links.race_id.or_else(|| query_param(href, "r"));
        }
    }

    links.country = cell
        .select(&flag_span_selector)
        .find_map(|span| flag_class_to_country(&span))
        .or_else(|| {
            cell.select(&img_selector)
                .filter(|img| img.value().attr("src").is_some_and(|s| s.contains("flag")))
                .find_map(|img| img_to_country_code(&img))
        });

    links
}

/// Parse a table element into a [`ResultsTable`].
///
/// Links to riders, teams and races in a column add `Rider_ID`, `Team_ID` and
/// `Race_ID` columns; a flag next to such a link adds `<Column>_Country`.
/// Tables showing the "No data" placeholder parse to an empty table.
pub fn parse_table(table: &ElementRef<'_>) -> ResultsTable {
    if is_no_data(table) {
        return ResultsTable::empty();
    }

    let tr_selector = sel("tr");
    let rows: Vec<ElementRef<'_>> = table.select(&tr_selector).collect();

    let mut columns: Vec<String> = Vec::new();
    let mut body: Vec<Vec<ElementRef<'_>>> = Vec::new();
    for row in &rows {
        let cells = row_cells(row);
        if cells.is_empty() {
            continue;
        }
        let all_header = cells.iter().all(|c| c.value().name() == "th");
        if all_header && columns.is_empty() && body.is_empty() {
            columns = header_names(&cells);
        } else if !all_header {
            body.push(cells);
        }
    }

    if body.is_empty() {
        return ResultsTable::empty();
    }

    if columns.is_empty() {
        let width = body
            .iter()
            .map(|cells| cells.iter().map(colspan).sum::<usize>())
            .max()
            .unwrap_or(0);
        columns = (0..width).map(|i| i.to_string()).collect();
    }

    let width = columns.len();
    let mut out_rows: Vec<Vec<String>> = Vec::with_capacity(body.len());
    let mut derived: Vec<Vec<(String, String)>> = Vec::with_capacity(body.len());

    for cells in &body {
        let mut values: Vec<String> = Vec::with_capacity(width);
        let mut extras: Vec<(String, String)> = Vec::new();

        for cell in cells {
            let column = columns.get(values.len()).cloned().unwrap_or_default();
            let text = element_text(cell);
            let links = cell_links(cell);

            let entity = if let Some(id) = links.rider_id {
                extras.push(("Rider_ID".to_string(), id.to_string()));
                Some("Rider")
            } else if let Some(id) = links.race_id {
                extras.push(("Race_ID".to_string(), id.to_string()));
                Some("Race")
            } else {
                None
            };
            if let Some(id) = links.team_id {
                extras.push(("Team_ID".to_string(), id.to_string()));
            }
            if let Some(country) = links.country {
                let prefix = entity
                    .map(str::to_string)
                    .or_else(|| links.team_id.map(|_| "Team".to_string()))
                    .unwrap_or(column);
                extras.push((format!("{}_Country", prefix), country));
            }

            for _ in 0..colspan(cell) {
                values.push(text.clone());
            }
        }

        values.resize(width, String::new());
        out_rows.push(values);
        derived.push(extras);
    }

    let mut table = ResultsTable {
        columns,
        rows: out_rows,
    };

    let mut extra_columns: Vec<String> = Vec::new();
    for (name, _) in derived.iter().flatten() {
        if !extra_columns.contains(name) && !table.has_column(name) {
            extra_columns.push(name.clone());
        }
    }
    for name in extra_columns {
        let mut values = derived.iter().map(|extras| {
            extras
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        });
        table.push_column(name.clone(), |_| values.next().unwrap_or_default());
    }

    table
}

/// What a page's tables look like, for `--debug` output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableDiagnostics {
    /// Selector that was counted
    pub selector: String,
    /// Number of tables matching the selector
    pub table_count: usize,
    /// `<tr>` count of the first matching table
    pub first_table_rows: usize,
    /// Text of up to three leading rows
    pub preview: Vec<String>,
    /// Shape of the parsed first table, when it has data rows
    pub parsed_shape: Option<(usize, usize)>,
    pub parsed_columns: Vec<String>,
}

/// Inspect tables matching `css` the way the parser would see them
pub fn inspect_tables(html: &str, css: &str) -> TableDiagnostics {
    let mut diagnostics = TableDiagnostics {
        selector: css.to_string(),
        ..Default::default()
    };

    let Ok(selector) = Selector::parse(css) else {
        return diagnostics;
    };
    let document = Html::parse_document(html);
    let tables: Vec<ElementRef<'_>> = document.select(&selector).collect();
    diagnostics.table_count = tables.len();

    if let Some(first) = tables.first() {
        let tr_selector = sel("tr");
        let rows: Vec<ElementRef<'_>> = first.select(&tr_selector).collect();
        diagnostics.first_table_rows = rows.len();
        diagnostics.preview = rows.iter().take(3).map(element_text).collect();

        if rows.len() > 1 {
            let parsed = parse_table(first);
            if !parsed.is_empty() {
                diagnostics.parsed_shape = Some((parsed.len(), parsed.columns.len()));
                diagnostics.parsed_columns = parsed.columns;
            }
        }
    }

    diagnostics
}

/// Years listed in the rider page's side menu
pub fn parse_years_active(document: &Html) -> Vec<i32> {
    let selector = sel("p.sidemeny2 a");
    let mut years = Vec::new();
    for link in document.select(&selector) {
        let text = element_text(&link);
        match text.parse::<i32>() {
            Ok(year) => years.push(year),
            Err(_) => {
                let err = ParseError::InvalidValue {
                    field: "years active".to_string(),
                    value: text,
                };
                tracing::warn!("could not collect rider's years active: {}", err);
                return Vec::new();
            }
        }
    }
    years
}

/// Current team and social handle from the rider page header
pub fn parse_header_details(document: &Html) -> HeaderDetails {
    let p_selector = sel("p");
    let left_link_selector = sel("p.left a");

    let current_team = document
        .select(&p_selector)
        .next()
        .map(|p| element_text(&p))
        .filter(|t| !t.is_empty());

    let twitter_handle = document
        .select(&left_link_selector)
        .next()
        .and_then(|a| link_to_twitter_handle(&a));

    HeaderDetails {
        current_team,
        twitter_handle,
    }
}

static RANKING_RE: OnceLock<Regex> = OnceLock::new();
static POINTS_RE: OnceLock<Regex> = OnceLock::new();
static TRAILING_INT_RE: OnceLock<Regex> = OnceLock::new();

/// Season details box (`table.tablesorter.notOddEven`) of a rider year page
pub fn parse_year_details(document: &Html) -> Option<RiderYearDetails> {
    let table_selector = sel("table.tablesorter.notOddEven");
    let span_selector = sel("span");
    let img_selector = sel("img");
    let link_selector = sel("a");

    let table = document.select(&table_selector).next()?;

    let ranking_re = RANKING_RE.get_or_init(|| Regex::new(r"Ranking:\s*(\d+)").expect("static regex"));
    let points_re = POINTS_RE.get_or_init(|| Regex::new(r"\(([\d.,\s]+?)\s*pts").expect("static regex"));
    let trailing_int_re =
        TRAILING_INT_RE.get_or_init(|| Regex::new(r":\s*([\d.]+)").expect("static regex"));

    let mut details = RiderYearDetails::default();
    for span in table.select(&span_selector) {
        let text = element_text(&span);

        if let Some(img) = span.select(&img_selector).next() {
            let (team, rest) = text.split_once('(').unwrap_or((text.as_str(), ""));
            details.team = Some(team.trim().to_string()).filter(|t| !t.is_empty());
            details.team_id = span.select(&link_selector).next().and_then(|a| team_link_to_id(&a));
            details.team_country = img_to_country_code(&img);
            details.division = rest
                .split(')')
                .next()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty());
        } else if text.contains("Ranking") {
            details.uci_ranking = ranking_re
                .captures(&text)
                .and_then(|c| c[1].parse().ok());
            details.uci_points = points_re.captures(&text).and_then(|c| {
                c[1].replace(' ', "").replace(',', ".").parse::<f64>().ok()
            });
        } else if text.contains("Wins") {
            details.uci_wins = last_number(trailing_int_re, &text);
        } else if text.contains("Race days") {
            details.race_days = last_number(trailing_int_re, &text);
        } else if text.contains("Distance") {
            details.distance_km = last_number(trailing_int_re, &text);
        }
    }

    Some(details)
}

/// Last `: <number>` in a label, ignoring thousands dots
fn last_number(re: &Regex, text: &str) -> Option<u32> {
    re.captures_iter(text)
        .last()
        .and_then(|c| c[1].replace('.', "").parse().ok())
}
