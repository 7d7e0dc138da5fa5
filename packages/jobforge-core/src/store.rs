//! The `TaskStore` contract: durable record set and atomic read/update and
//! conditional spawn (spec §2, §3 "Ownership", §5 "Shared-resource policy").
//!
//! Modeled on `seesaw::job::JobStore` (claim/mark_succeeded/mark_failed/
//! heartbeat), extended with the task fields that trait's generic `ClaimedJob`
//! doesn't carry (`tracking_id`, `ancestry_chain`, `spawn_depth`,
//! `pipeline_state`) and with the non-task record kinds (`Company`,
//! `JobSource`, `JobListing`, `JobMatch`) this worker also owns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::company::Company;
use crate::config::ConfigSnapshot;
use crate::error::StoreError;
use crate::job_match::JobMatch;
use crate::listing::JobListing;
use crate::source::JobSource;
use crate::spawn::SpawnRejection;
use crate::task::{Task, TaskKind, TaskPayload, TaskStatus};

pub type Result<T> = std::result::Result<T, StoreError>;

/// A task handed to a worker by [`TaskStore::claim_ready`], holding the lease.
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub task: Task,
    pub leased_at: DateTime<Utc>,
    pub lease_expires_at: DateTime<Utc>,
}

/// Durable record set and atomic read/update/conditional-spawn access,
/// implemented against Postgres by `jobforge-worker`.
///
/// Every method that mutates a record does so atomically: either a
/// compare-and-set on `updated_at`/`status`, or a single transaction scoped
/// to that record (spec §5). Queue leasing is an atomic Pending->Processing
/// transition by exactly one worker per task id.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Lease up to `limit` ready tasks in `(created_at ASC)` order (FIFO),
    /// atomically transitioning each from Pending to Processing.
    async fn claim_ready(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedTask>>;

    /// Extend a task's lease. Workers call this periodically during long
    /// AI/scrape calls so another worker doesn't reclaim a genuinely slow
    /// (not stuck) task before `processing_timeout_seconds` elapses
    /// (supplement #1).
    async fn heartbeat(&self, task_id: Uuid) -> Result<()>;

    /// Mark a task Success. Terminal.
    async fn mark_succeeded(&self, task_id: Uuid) -> Result<()>;

    /// Mark a task Filtered. Terminal; a filtered job is a success from the
    /// system's perspective (spec §7 "User-visible behavior").
    async fn mark_filtered(&self, task_id: Uuid, reason: &str) -> Result<()>;

    /// Mark a task Skipped. Terminal; same status as Filtered.
    async fn mark_skipped(&self, task_id: Uuid, reason: &str) -> Result<()>;

    /// Mark a task Failed. If `retry_count < max_retries`, the store
    /// re-enqueues it as Pending with `retry_count` incremented and a
    /// backoff-scheduled visibility time (spec §4.1 "Failure semantics");
    /// otherwise the task terminates Failed.
    async fn mark_failed(&self, task_id: Uuid, error_details: &str) -> Result<()>;

    /// Re-enqueue the same task as a new Pending record, preserving
    /// `tracking_id` and `ancestry_chain`, with the given `pipeline_state`
    /// update applied (spec §4.9 step 3, "company-wait requeue"). When
    /// `payload_override` is `Some`, the new task carries it instead of the
    /// original's payload — used so a legacy `scraped_data` job-listing task
    /// requeues pointing at the listing row it already materialized, rather
    /// than re-entering the legacy branch and tripping its own dedupe check
    /// (spec §9 back-compat). Returns the new task id.
    async fn requeue_self(
        &self,
        task_id: Uuid,
        company_wait_retries: u32,
        not_before: DateTime<Utc>,
        payload_override: Option<TaskPayload>,
    ) -> Result<Uuid>;

    /// Attempt to spawn a child task under `parent_id`, enforcing the four
    /// spawn-safety checks (spec §4.1 invariant). Returns `Ok(Some(child_id))`
    /// on success, `Ok(None)` if the spawn was safely deduplicated (logged,
    /// not an error), and never fabricates a child on rejection.
    async fn try_spawn(
        &self,
        parent_id: Uuid,
        payload: TaskPayload,
        max_retries: u32,
    ) -> Result<std::result::Result<Uuid, SpawnRejection>>;

    async fn get_task(&self, task_id: Uuid) -> Result<Task>;

    /// Insert a brand-new root task (fresh `tracking_id`, empty ancestry,
    /// `spawn_depth` 0) and return its id. The entry point for the intake
    /// contract (spec §6): unlike `try_spawn`, there is no parent to run
    /// spawn-safety checks against, so this never rejects.
    async fn submit_task(&self, payload: TaskPayload, max_retries: u32) -> Result<Uuid>;

    // -- Company --------------------------------------------------------
    async fn get_company_by_name(&self, normalized_name: &str) -> Result<Option<Company>>;
    async fn upsert_company(&self, company: &Company) -> Result<()>;
    /// Transition `company.analysis_status`; rejects illegal transitions
    /// (spec §3 invariant) with `StoreError::InvalidTransition`.
    async fn transition_company_status(
        &self,
        normalized_name: &str,
        to: crate::company::AnalysisStatus,
    ) -> Result<()>;

    // -- JobSource --------------------------------------------------------
    async fn get_source(&self, source_id: Uuid) -> Result<JobSource>;
    async fn insert_source(&self, source: &JobSource) -> Result<Uuid>;
    async fn record_source_outcome(&self, source_id: Uuid, success: bool) -> Result<()>;
    async fn find_source_by_url(&self, normalized_url: &str) -> Result<Option<JobSource>>;

    // -- JobListing --------------------------------------------------------
    async fn find_listing_by_normalized_url(&self, normalized_url: &str) -> Result<Option<JobListing>>;
    async fn insert_listing(&self, listing: &JobListing) -> Result<Uuid>;
    async fn update_listing(&self, listing: &JobListing) -> Result<()>;
    async fn get_listing(&self, listing_id: Uuid) -> Result<JobListing>;

    // -- JobMatch --------------------------------------------------------
    async fn insert_match(&self, job_match: &JobMatch) -> Result<()>;

    // -- Config -----------------------------------------------------------
    /// Current config snapshot. The Config Loader is the sole writer;
    /// readers always see one consistent snapshot (spec §5).
    async fn config_snapshot(&self) -> Result<ConfigSnapshot>;

    // -- Budgets ------------------------------------------------------------
    /// Atomically increment today's search-API call counter and return the
    /// new total, so the caller can compare against `daily_search_cap`
    /// (spec §5 "Budgets", §7 `BudgetExhausted`).
    async fn increment_daily_search_count(&self) -> Result<u32>;

    /// Atomically accumulate AI token/cost usage for one task run.
    async fn record_ai_usage(&self, task_id: Uuid, tokens: u64, cost_cents: u64) -> Result<()>;

    // -- Lineage queries used by spawn safety ------------------------------
    /// Whether a Pending or Processing task already exists with the given
    /// `(tracking_id, target_url, kind)` (spec §4.1 check 3).
    async fn has_pending_or_processing_sibling(
        &self,
        tracking_id: Uuid,
        target_url: &str,
        kind: TaskKind,
    ) -> Result<bool>;

    /// Whether `target_url` already reached a terminal state anywhere in
    /// this lineage (spec §4.1 check 4).
    async fn target_already_terminal_in_lineage(
        &self,
        tracking_id: Uuid,
        target_url: &str,
        kind: TaskKind,
    ) -> Result<bool>;

    /// `(task_id, kind, target_url)` triples for every ancestor task in
    /// `ancestry_chain` that has a single natural target URL (spec §4.1
    /// check 2).
    async fn ancestor_target_urls(&self, ancestry: &[Uuid]) -> Result<Vec<(Uuid, TaskKind, String)>>;

    /// Find an existing Company task anywhere in this lineage for the given
    /// normalized company name (spec §4.9 step 3: "no Company task for this
    /// company exists in this lineage").
    async fn find_company_task_in_lineage(
        &self,
        tracking_id: Uuid,
        normalized_company_name: &str,
    ) -> Result<Option<Task>>;
}

/// Validates a requested status transition before the store performs it.
/// Shared helper so every `TaskStore` implementation enforces the same
/// state machine (spec §8 property 1).
pub fn validate_task_transition(from: TaskStatus, to: TaskStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition {
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_illegal_task_transition() {
        let err = validate_task_transition(TaskStatus::Success, TaskStatus::Processing).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[test]
    fn validate_allows_legal_task_transition() {
        assert!(validate_task_transition(TaskStatus::Pending, TaskStatus::Processing).is_ok());
    }
}
