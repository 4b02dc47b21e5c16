//! Error types for the FirstCycling MCP server
//!
//! This module defines the error hierarchy for all operations in the server.
//! A page without data is not an error; it parses to an empty table.

use thiserror::Error;

/// Main error type for the FirstCycling MCP server
#[derive(Error, Debug)]
pub enum FirstCyclingError {
    /// Upstream fetch errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// HTML structure errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors talking to firstcycling.com
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Page not found: {url}")]
    NotFound { url: String },

    #[error("Request failed ({status}): {url}")]
    RequestFailed { status: u16, url: String },
}

/// Errors raised when a page does not have the expected structure
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Unexpected table structure: {message}")]
    UnexpectedStructure { message: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidEnvVar { var: String, value: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Result type alias for FirstCycling operations
pub type Result<T> = std::result::Result<T, FirstCyclingError>;
