//! Generic Scraper (spec §4.6): drives one [`JobSource`] from its declarative
//! `config`, branching on `source_type` into one of three fetch-mode
//! functions that share the field-extraction helper in [`fields`] (spec §9,
//! "class hierarchies of scrapers" redesign guidance).

pub mod api;
pub mod auth;
pub mod error;
pub mod fields;
pub mod html;
pub mod jsonpath;
pub mod normalized;
pub mod rss;

use jobforge_core::source::{SourceConfig, SourceType};
use tracing::instrument;

pub use error::{Result, ScrapeError};
pub use normalized::NormalizedJob;

/// Scrape one source. Never returns an error for an empty result set — a
/// malformed/unreachable source comes back as `Err` so the caller can update
/// source health (spec §4.6 "Produces zero jobs on scrape failure (not an
/// error)"); only a genuinely empty-but-successful page returns `Ok(vec![])`.
#[instrument(skip(http, config), fields(source_type = ?config.source_type, url = %config.url))]
pub async fn scrape(http: &reqwest::Client, config: &SourceConfig) -> Result<Vec<NormalizedJob>> {
    config.validate().map_err(|e| ScrapeError::Config(e.to_string()))?;
    match config.source_type {
        SourceType::Api => api::scrape(http, config).await,
        SourceType::Rss => rss::scrape(http, config).await,
        SourceType::Html => html::scrape(http, config).await,
    }
}
