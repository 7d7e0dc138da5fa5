//! The `Task` record: the unit of work the dispatcher leases and processors
//! consume (spec §3, §4.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorCategory;

/// The five task kinds. Each maps to exactly one processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Company,
    JobListing,
    Scrape,
    SourceDiscovery,
    ScrapeSource,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Company => "company",
            TaskKind::JobListing => "job_listing",
            TaskKind::Scrape => "scrape",
            TaskKind::SourceDiscovery => "source_discovery",
            TaskKind::ScrapeSource => "scrape_source",
        }
    }
}

/// Task status. `Filtered`, `Skipped`, `Failed`, and `Success` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Success,
    Filtered,
    Skipped,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Filtered | TaskStatus::Skipped | TaskStatus::Failed
        )
    }

    /// Whether `self -> to` is a legal transition per spec §4.1. Internal
    /// Failed -> Pending retries are modeled separately (`Task::retry_count`
    /// increments rather than the task itself moving back to Pending as an
    /// externally observed transition), so this only covers the lease cycle.
    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Pending, Processing)
                | (Processing, Success)
                | (Processing, Filtered)
                | (Processing, Skipped)
                | (Processing, Failed)
                | (Failed, Pending)
        )
    }
}

/// Kind-specific payload. Replaces the original's dynamic dict (spec §9): one
/// tagged variant per task kind, nothing else is ever stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    Company {
        url: Option<String>,
        company_name: String,
    },
    JobListing {
        listing_id: Option<Uuid>,
        scraped_data: Option<ScrapedJobData>,
    },
    Scrape {
        url: String,
    },
    SourceDiscovery {
        url: String,
        hints: Option<String>,
    },
    ScrapeSource {
        source_id: Uuid,
    },
}

impl TaskPayload {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskPayload::Company { .. } => TaskKind::Company,
            TaskPayload::JobListing { .. } => TaskKind::JobListing,
            TaskPayload::Scrape { .. } => TaskKind::Scrape,
            TaskPayload::SourceDiscovery { .. } => TaskKind::SourceDiscovery,
            TaskPayload::ScrapeSource { .. } => TaskKind::ScrapeSource,
        }
    }

    /// The normalized target URL this payload routes on, used by the spawn
    /// safety checks. `None` for payloads with no single natural URL (e.g. a
    /// job listing task that only carries a `listing_id`).
    pub fn target_url(&self) -> Option<&str> {
        match self {
            TaskPayload::Company { url, .. } => url.as_deref(),
            TaskPayload::Scrape { url } => Some(url),
            TaskPayload::SourceDiscovery { url, .. } => Some(url),
            TaskPayload::JobListing { .. } | TaskPayload::ScrapeSource { .. } => None,
        }
    }
}

/// Legacy scraped-data shape, kept for one-way reading only (spec §9): a
/// job listing task may inherit a pre-normalized blob from a scraper that
/// predates the `JobListing` record existing. Processors convert this into a
/// `JobListing` row on first touch; it is never written back out in this
/// shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedJobData {
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: String,
    pub url: String,
    pub posted_date: Option<String>,
    pub salary: Option<String>,
}

/// Lightweight status metadata only — never durable intermediate data used
/// for routing (spec §3, §9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    /// Observability-only label, e.g. "scrape", "company_lookup", "wait_company".
    pub pipeline_stage: Option<String>,
    /// Incremented each time the job-listing task requeues itself waiting on
    /// its company (spec §4.9 step 3).
    pub company_wait_retries: u32,
    /// The listing this task concerns, once resolved.
    pub listing_id: Option<Uuid>,
}

/// One durable record of a lease attempt: when it started, and how it ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub leased_at: DateTime<Utc>,
    pub worker_id: String,
    pub outcome: Option<AttemptOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptOutcome {
    pub finished_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub error_category: Option<ErrorCategory>,
    pub error_details: Option<String>,
}

/// Serde derive for `ErrorCategory` lives here rather than in `error.rs` to
/// keep that module free of the serde dependency for crates that only need
/// `Categorizable` without persistence.
impl Serialize for ErrorCategory {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            ErrorCategory::TransientNetwork => "transient_network",
            ErrorCategory::PermanentSource => "permanent_source",
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::ParseError => "parse_error",
            ErrorCategory::BudgetExhausted => "budget_exhausted",
            ErrorCategory::InvalidState => "invalid_state",
            ErrorCategory::MissingConfig => "missing_config",
        };
        serializer.serialize_str(s)
    }
}

impl<'de> Deserialize<'de> for ErrorCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "transient_network" => Ok(ErrorCategory::TransientNetwork),
            "permanent_source" => Ok(ErrorCategory::PermanentSource),
            "rate_limited" => Ok(ErrorCategory::RateLimited),
            "parse_error" => Ok(ErrorCategory::ParseError),
            "budget_exhausted" => Ok(ErrorCategory::BudgetExhausted),
            "invalid_state" => Ok(ErrorCategory::InvalidState),
            "missing_config" => Ok(ErrorCategory::MissingConfig),
            other => Err(serde::de::Error::unknown_variant(
                other,
                &[
                    "transient_network",
                    "permanent_source",
                    "rate_limited",
                    "parse_error",
                    "budget_exhausted",
                    "invalid_state",
                    "missing_config",
                ],
            )),
        }
    }
}

/// Ordered list of ancestor task ids, root first, current parent last.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AncestryChain(pub Vec<Uuid>);

impl AncestryChain {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn extend(&self, parent_id: Uuid) -> Self {
        let mut chain = self.0.clone();
        chain.push(parent_id);
        Self(chain)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.0.contains(&id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub payload: TaskPayload,
    pub pipeline_state: PipelineState,
    pub tracking_id: Uuid,
    pub ancestry_chain: AncestryChain,
    pub spawn_depth: u32,
    pub retry_count: u32,
    pub max_retries: u32,
    pub attempts: Vec<Attempt>,
    pub depends_on_task_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// A brand-new root task: `tracking_id` equals its own id, `spawn_depth`
    /// is 0, `ancestry_chain` is empty.
    pub fn new_root(id: Uuid, payload: TaskPayload, max_retries: u32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            kind: payload.kind(),
            status: TaskStatus::Pending,
            payload,
            pipeline_state: PipelineState::default(),
            tracking_id: id,
            ancestry_chain: AncestryChain::root(),
            spawn_depth: 0,
            retry_count: 0,
            max_retries,
            attempts: Vec::new(),
            depends_on_task_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// A child task inheriting `tracking_id` from its root ancestor and
    /// extending `ancestry_chain` with the parent's id.
    pub fn new_child(
        id: Uuid,
        parent: &Task,
        payload: TaskPayload,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind: payload.kind(),
            status: TaskStatus::Pending,
            payload,
            pipeline_state: PipelineState::default(),
            tracking_id: parent.tracking_id,
            ancestry_chain: parent.ancestry_chain.extend(parent.id),
            spawn_depth: parent.spawn_depth + 1,
            retry_count: 0,
            max_retries,
            attempts: Vec::new(),
            depends_on_task_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn legal_transitions() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Processing));
        assert!(TaskStatus::Processing.can_transition_to(TaskStatus::Success));
        assert!(TaskStatus::Processing.can_transition_to(TaskStatus::Failed));
        assert!(TaskStatus::Failed.can_transition_to(TaskStatus::Pending));
    }

    #[test]
    fn illegal_transitions_rejected() {
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Success));
        assert!(!TaskStatus::Success.can_transition_to(TaskStatus::Processing));
        assert!(!TaskStatus::Filtered.can_transition_to(TaskStatus::Pending));
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Filtered.is_terminal());
        assert!(TaskStatus::Skipped.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
    }

    #[test]
    fn child_inherits_tracking_id_and_extends_ancestry() {
        let root_id = Uuid::new_v4();
        let root = Task::new_root(
            root_id,
            TaskPayload::Company {
                url: None,
                company_name: "Acme".into(),
            },
            3,
            now(),
        );
        let child_id = Uuid::new_v4();
        let child = Task::new_child(
            child_id,
            &root,
            TaskPayload::ScrapeSource {
                source_id: Uuid::new_v4(),
            },
            3,
            now(),
        );
        assert_eq!(child.tracking_id, root.tracking_id);
        assert_eq!(child.spawn_depth, 1);
        assert!(child.ancestry_chain.contains(root_id));
    }
}
