//! FirstCycling MCP Server Library
//!
//! Scrapes professional cycling data from FirstCycling.com and serves it
//! as Model Context Protocol tools.

pub mod config;
pub mod error;
pub mod firstcycling;
pub mod mcp;

pub use config::Config;
pub use error::{FirstCyclingError, Result};
