//! FirstCycling.com scraping
//!
//! Page fetching, HTML table extraction and the rider, race and search
//! operations built on top of them.

pub mod client;
pub mod format;
pub mod parser;
pub mod race;
pub mod rider;
pub mod search;
pub mod types;
