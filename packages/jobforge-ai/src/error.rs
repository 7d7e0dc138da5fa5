//! Error taxonomy for the AI Agent Manager (spec §4.5, §7).

use jobforge_core::error::{Categorizable, ErrorCategory};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("response did not conform to the schema after repair: {0}")]
    FailedParse(String),

    #[error("call would exceed per-call budget: {limit_kind} limit {limit}, would use {would_use}")]
    FailedBudget {
        limit_kind: &'static str,
        limit: u64,
        would_use: u64,
    },
}

impl From<openai_client::OpenAIError> for AiError {
    fn from(e: openai_client::OpenAIError) -> Self {
        AiError::Transport(e.to_string())
    }
}

impl Categorizable for AiError {
    fn category(&self) -> ErrorCategory {
        match self {
            AiError::Transport(_) => ErrorCategory::TransientNetwork,
            AiError::FailedParse(_) => ErrorCategory::ParseError,
            AiError::FailedBudget { .. } => ErrorCategory::BudgetExhausted,
        }
    }
}

pub type Result<T> = std::result::Result<T, AiError>;
