//! Configuration management for the FirstCycling MCP server
//!
//! Handles environment variables and defaults for the upstream site.

use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Default upstream site
pub const DEFAULT_BASE_URL: &str = "https://firstcycling.com";

/// User agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "firstcycling-app/1.0";

/// Request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the FirstCycling client
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the site, without trailing slash
    pub base_url: String,

    /// User agent header value
    pub user_agent: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Config {
    /// Create a new configuration from the environment
    pub fn new() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Create a configuration from a variable lookup, falling back to defaults
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("FIRSTCYCLING_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let user_agent =
            lookup("FIRSTCYCLING_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let timeout_secs = match lookup("FIRSTCYCLING_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvVar {
                var: "FIRSTCYCLING_TIMEOUT_SECS".to_string(),
                value: raw.clone(),
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Self::build(base_url, user_agent, Duration::from_secs(timeout_secs))
    }

    /// Configuration pointing at another host, e.g. a local mock server
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::build(
            base_url.into(),
            DEFAULT_USER_AGENT.to_string(),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    fn build(base_url: String, user_agent: String, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidConfig {
                message: format!("base URL must be http(s): {}", base_url),
            }
            .into());
        }

        if timeout.is_zero() {
            return Err(ConfigError::InvalidConfig {
                message: "timeout must be greater than zero".to_string(),
            }
            .into());
        }

        Ok(Self {
            base_url,
            user_agent,
            timeout,
        })
    }
}

/// Site constants
pub mod site {
    /// Rider page script
    pub const RIDER_PAGE: &str = "rider.php";

    /// Race page script
    pub const RACE_PAGE: &str = "race.php";

    /// Search page script
    pub const SEARCH_PAGE: &str = "search.php";

    /// Marker the site prints inside empty tables
    pub const NO_DATA: &str = "No data";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::error::FirstCyclingError;

    #[test]
    fn test_with_base_url_trims_slash() {
        let config = Config::with_base_url("http://127.0.0.1:8080/").unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(Config::with_base_url("ftp://firstcycling.com").is_err());
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_vars(|_| None).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_reads_overrides() {
        let env = vars(&[
            ("FIRSTCYCLING_BASE_URL", "http://localhost:8080/"),
            ("FIRSTCYCLING_USER_AGENT", "test-agent/0.1"),
            ("FIRSTCYCLING_TIMEOUT_SECS", " 5 "),
        ]);
        let config = Config::from_vars(|key| env.get(key).cloned()).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.user_agent, "test-agent/0.1");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_bad_timeout() {
        let env = vars(&[("FIRSTCYCLING_TIMEOUT_SECS", "soon")]);
        let err = Config::from_vars(|key| env.get(key).cloned()).unwrap_err();
        assert!(matches!(
            err,
            FirstCyclingError::Config(ConfigError::InvalidEnvVar { ref value, .. }) if value == "soon"
        ));

        let env = vars(&[("FIRSTCYCLING_TIMEOUT_SECS", "0")]);
        let err = Config::from_vars(|key| env.get(key).cloned()).unwrap_err();
        assert!(matches!(
            err,
            FirstCyclingError::Config(ConfigError::InvalidConfig { .. })
        ));
    }
}
