//! Error taxonomy for the Generic Scraper (spec §4.6, §7).
//!
//! `scrape()` itself surfaces a failed fetch/parse as `Err`; the source
//! processor is the one that turns that into "zero jobs, not a hard error"
//! by recording the outcome against the source's health counters rather
//! than propagating it as a listing-level failure (spec §4.6 "Produces
//! zero jobs on scrape failure").

use jobforge_core::error::{Categorizable, ErrorCategory};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("source config error: {0}")]
    Config(String),
}

impl Categorizable for ScrapeError {
    fn category(&self) -> ErrorCategory {
        match self {
            ScrapeError::Network(_) => ErrorCategory::TransientNetwork,
            ScrapeError::Upstream { status, .. } if *status == 429 => ErrorCategory::RateLimited,
            ScrapeError::Upstream { .. } => ErrorCategory::PermanentSource,
            ScrapeError::Parse(_) => ErrorCategory::ParseError,
            ScrapeError::Config(_) => ErrorCategory::MissingConfig,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
