//! Error taxonomy (spec §7) and the `Categorizable` trait the dispatcher uses
//! to decide retry vs. terminal without matching on strings.
//!
//! Modeled on `seesaw::error::SafeErrorCategory`: a small closed enum that
//! callers switch on, plus a trait that lets every error type in the
//! workspace report its category without the dispatcher needing to know the
//! concrete error type.

use thiserror::Error;

/// The seven error categories from the design doc's error handling section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection reset, 5xx, timeout. Retried by the task-level retry mechanism.
    TransientNetwork,
    /// 4xx other than 429, or invalid config. Marks source health; no retry
    /// unless the config changes.
    PermanentSource,
    /// 429 or a documented quota. Backs off; counts as transient up to a cap.
    RateLimited,
    /// AI response non-conformant, or the scraper returned unusable data.
    ParseError,
    /// Daily search or per-task AI budget hit.
    BudgetExhausted,
    /// State-machine violation. Always fatal for the task; never retried.
    InvalidState,
    /// Required policy key absent. Fatal at worker startup; no task runs.
    MissingConfig,
}

impl ErrorCategory {
    /// Whether the task-level retry mechanism should re-enqueue on this category.
    ///
    /// `RateLimited` is retryable up to a cap enforced by the dispatcher, not
    /// by this method; `BudgetExhausted` is retryable only in the sense that a
    /// later day's budget may allow it, which the dispatcher also handles
    /// separately from ordinary backoff.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCategory::TransientNetwork | ErrorCategory::RateLimited
        )
    }

    /// Whether this category must abort the task immediately with no retry,
    /// regardless of remaining `retry_count`.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorCategory::InvalidState | ErrorCategory::MissingConfig)
    }
}

/// Implemented by every error type in the workspace so the dispatcher can
/// categorize failures without matching on variant names across crates.
pub trait Categorizable {
    fn category(&self) -> ErrorCategory;
}

/// Top-level error for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("state transition rejected: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("conflicting update: {0} (compare-and-set failed, retry read)")]
    Conflict(String),

    #[error("required config key missing: {0}")]
    MissingConfig(String),

    #[error("database error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Categorizable for StoreError {
    fn category(&self) -> ErrorCategory {
        match self {
            StoreError::NotFound(_) => ErrorCategory::InvalidState,
            StoreError::InvalidTransition { .. } => ErrorCategory::InvalidState,
            StoreError::Conflict(_) => ErrorCategory::TransientNetwork,
            StoreError::MissingConfig(_) => ErrorCategory::MissingConfig,
            StoreError::Backend(_) => ErrorCategory::TransientNetwork,
        }
    }
}

/// Errors surfaced by enrichment clients, the generic scraper, and the AI
/// agent manager, wrapped by the worker-level error below.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    #[error("permanent source failure: {0}")]
    PermanentSource(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("budget exhausted: {0}")]
    BudgetExhausted(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("missing config: {0}")]
    MissingConfig(String),
}

impl Categorizable for WorkerError {
    fn category(&self) -> ErrorCategory {
        match self {
            WorkerError::Store(e) => e.category(),
            WorkerError::TransientNetwork(_) => ErrorCategory::TransientNetwork,
            WorkerError::PermanentSource(_) => ErrorCategory::PermanentSource,
            WorkerError::RateLimited(_) => ErrorCategory::RateLimited,
            WorkerError::Parse(_) => ErrorCategory::ParseError,
            WorkerError::BudgetExhausted(_) => ErrorCategory::BudgetExhausted,
            WorkerError::InvalidState(_) => ErrorCategory::InvalidState,
            WorkerError::MissingConfig(_) => ErrorCategory::MissingConfig,
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_categories() {
        assert!(ErrorCategory::TransientNetwork.is_retryable());
        assert!(ErrorCategory::RateLimited.is_retryable());
        assert!(!ErrorCategory::ParseError.is_retryable());
    }

    #[test]
    fn fatal_categories_never_retry() {
        assert!(ErrorCategory::InvalidState.is_fatal());
        assert!(ErrorCategory::MissingConfig.is_fatal());
        assert!(!ErrorCategory::TransientNetwork.is_fatal());
    }

    #[test]
    fn store_error_categorization() {
        let e = StoreError::InvalidTransition {
            from: "Failed".into(),
            to: "Active".into(),
        };
        assert_eq!(e.category(), ErrorCategory::InvalidState);
    }
}
