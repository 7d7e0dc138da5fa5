//! Error taxonomy for enrichment clients (spec §7). Enrichment failures are
//! local: a client returns `Err` and the caller folds it into an empty or
//! partial result rather than failing the task (spec §7 "Propagation
//! policy").

use jobforge_core::error::{Categorizable, ErrorCategory};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("response parse error: {0}")]
    Parse(String),
    #[error("daily search quota exhausted")]
    QuotaExhausted,
}

impl Categorizable for EnrichmentError {
    fn category(&self) -> ErrorCategory {
        match self {
            EnrichmentError::Network(_) => ErrorCategory::TransientNetwork,
            EnrichmentError::Upstream { status, .. } if *status == 429 => ErrorCategory::RateLimited,
            EnrichmentError::Upstream { .. } => ErrorCategory::TransientNetwork,
            EnrichmentError::Parse(_) => ErrorCategory::ParseError,
            EnrichmentError::QuotaExhausted => ErrorCategory::BudgetExhausted,
        }
    }
}

pub type Result<T> = std::result::Result<T, EnrichmentError>;
