//! FirstCycling HTTP client
//!
//! Fetches raw HTML pages from firstcycling.com. Parsing lives in the
//! rider, race and search modules.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};

use crate::config::site::{RACE_PAGE, RIDER_PAGE, SEARCH_PAGE};
use crate::config::Config;
use crate::error::{FetchError, FirstCyclingError, Result};
use crate::firstcycling::types::{RaceId, RiderId};

/// Query parameters for `rider.php`. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiderQuery {
    /// Season (`y`)
    pub year: Option<i32>,
    /// Highlights listing (`high=1`)
    pub high: bool,
    /// Listing kind within a section (`k`)
    pub kind: Option<u8>,
    /// Only UCI wins (`uci=1`)
    pub uci: bool,
    /// Only World Tour wins (`wt=1`)
    pub world_tour: bool,
    /// Statistics section (`stats=1`)
    pub stats: bool,
    /// History at one race (`ra`)
    pub race: Option<RaceId>,
    /// Team history (`teams=1`)
    pub teams: bool,
}

impl RiderQuery {
    /// Query pairs in the order the site builds its own links
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(year) = self.year {
            pairs.push(("y", year.to_string()));
        }
        if self.high {
            pairs.push(("high", "1".to_string()));
        }
        if self.stats {
            pairs.push(("stats", "1".to_string()));
        }
        if let Some(kind) = self.kind {
            pairs.push(("k", kind.to_string()));
        }
        if self.uci {
            pairs.push(("uci", "1".to_string()));
        }
        if self.world_tour {
            pairs.push(("wt", "1".to_string()));
        }
        if let Some(race) = self.race {
            pairs.push(("ra", race.to_string()));
        }
        if self.teams {
            pairs.push(("teams", "1".to_string()));
        }
        pairs
    }
}

/// Query parameters for `race.php`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RaceQuery {
    /// Edition year (`y`)
    pub year: Option<i32>,
    /// Classification (`k`), e.g. points or youth
    pub classification: Option<u8>,
    /// Stage number (`e`)
    pub stage: Option<u8>,
}

impl RaceQuery {
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(year) = self.year {
            pairs.push(("y", year.to_string()));
        }
        if let Some(classification) = self.classification {
            pairs.push(("k", classification.to_string()));
        }
        if let Some(stage) = self.stage {
            pairs.push(("e", stage.to_string()));
        }
        pairs
    }
}

/// A fetched page together with the URL it came from
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub html: String,
}

/// firstcycling.com client
#[derive(Clone)]
pub struct FirstCyclingClient {
    /// HTTP client
    http_client: reqwest::Client,

    /// Site root, no trailing slash
    base_url: String,
}

impl FirstCyclingClient {
    /// Create a new client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html"));

        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10).min(config.timeout))
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a site script and its query
    pub fn page_url(&self, script: &str, pairs: &[(&str, String)]) -> String {
        let mut url = format!("{}/{}", self.base_url, script);
        let query = pairs
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    /// URL of a rider page
    pub fn rider_url(&self, rider_id: RiderId, query: &RiderQuery) -> String {
        let mut pairs = vec![("r", rider_id.to_string())];
        pairs.extend(query.to_pairs());
        self.page_url(RIDER_PAGE, &pairs)
    }

    /// URL of a race page
    pub fn race_url(&self, race_id: RaceId, query: &RaceQuery) -> String {
        let mut pairs = vec![("r", race_id.to_string())];
        pairs.extend(query.to_pairs());
        self.page_url(RACE_PAGE, &pairs)
    }

    /// URL of the search page
    pub fn search_url(&self, query: &str) -> String {
        self.page_url(SEARCH_PAGE, &[("s", query.trim().to_string())])
    }

    /// Fetch a rider page
    pub async fn rider_page(&self, rider_id: RiderId, query: &RiderQuery) -> Result<Page> {
        self.fetch(self.rider_url(rider_id, query)).await
    }

    /// Fetch a race page
    pub async fn race_page(&self, race_id: RaceId, query: &RaceQuery) -> Result<Page> {
        self.fetch(self.race_url(race_id, query)).await
    }

    /// Fetch the search page
    pub async fn search_page(&self, query: &str) -> Result<Page> {
        self.fetch(self.search_url(query)).await
    }

    /// GET a page and return its body
    pub async fn fetch(&self, url: String) -> Result<Page> {
        tracing::debug!(url = %url, "GET");

        let response = self.http_client.get(&url).send().await?;

        if response.status().is_success() {
            let html = response.text().await?;
            tracing::debug!(url = %url, bytes = html.len(), "fetched page");
            Ok(Page { url, html })
        } else if response.status().as_u16() == 404 {
            Err(FirstCyclingError::Fetch(FetchError::NotFound { url }))
        } else {
            Err(FirstCyclingError::Fetch(FetchError::RequestFailed {
                status: response.status().as_u16(),
                url,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(base_url: &str) -> FirstCyclingClient {
        let config = Config::with_base_url(base_url).unwrap();
        FirstCyclingClient::new(&config).unwrap()
    }

    #[test]
    fn test_rider_url_drops_unset_params() {
        let client = client_for("https://firstcycling.com");
        let query = RiderQuery {
            high: true,
            kind: Some(1),
            world_tour: true,
            ..Default::default()
        };
        assert_eq!(
            client.rider_url(RiderId(16672), &query),
            "https://firstcycling.com/rider.php?r=16672&high=1&k=1&wt=1"
        );
        assert_eq!(
            client.rider_url(RiderId(16672), &RiderQuery::default()),
            "https://firstcycling.com/rider.php?r=16672"
        );
    }

    #[test]
    fn test_race_and_search_urls() {
        let client = client_for("https://firstcycling.com/");
        let query = RaceQuery {
            year: Some(2023),
            stage: Some(4),
            ..Default::default()
        };
        assert_eq!(
            client.race_url(RaceId(17), &query),
            "https://firstcycling.com/race.php?r=17&y=2023&e=4"
        );
        assert_eq!(
            client.search_url(" van der poel "),
            "https://firstcycling.com/search.php?s=van%20der%20poel"
        );
    }

    #[tokio::test]
    async fn test_fetch_sends_headers() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rider.php"))
            .and(query_param("r", "16973"))
            .and(header("accept", "text/html"))
            .and(header("user-agent", "firstcycling-app/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let page = tokio_test::assert_ok!(
            client
                .rider_page(RiderId(16973), &RiderQuery::default())
                .await
        );
        assert_eq!(page.html, "<html></html>");
        assert!(page.url.ends_with("/rider.php?r=16973"));
    }

    #[tokio::test]
    async fn test_fetch_maps_status_codes() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/race.php"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search.php"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());

        let err = client
            .race_page(RaceId(17), &RaceQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FirstCyclingError::Fetch(FetchError::NotFound { .. })));

        let err = client.search_page("pogacar").await.unwrap_err();
        assert!(matches!(
            err,
            FirstCyclingError::Fetch(FetchError::RequestFailed { status: 503, .. })
        ));
    }
}
