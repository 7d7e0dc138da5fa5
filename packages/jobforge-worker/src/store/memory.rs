//! In-memory `TaskStore`, grounded on `extraction/src/stores/memory.rs`:
//! `RwLock<HashMap<...>>` behind the same trait real callers use, for tests
//! and local development. Not suitable for production — state is lost on
//! restart and there is no real atomicity across processes, only within
//! this one.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobforge_core::company::{AnalysisStatus, Company};
use jobforge_core::config::ConfigSnapshot;
use jobforge_core::error::StoreError;
use jobforge_core::job_match::JobMatch;
use jobforge_core::listing::JobListing;
use jobforge_core::normalize::{normalize_company_name, normalize_url};
use jobforge_core::source::JobSource;
use jobforge_core::spawn::{check_spawn_safety, SpawnContext, SpawnRejection, DEFAULT_MAX_SPAWN_DEPTH};
use jobforge_core::store::{validate_task_transition, ClaimedTask, TaskStore};
use jobforge_core::task::{Attempt, AttemptOutcome, Task, TaskKind, TaskPayload, TaskStatus};
use serde_json::Value;
use uuid::Uuid;

use crate::backoff::not_before;
use crate::store::dedupe_key;

const DEFAULT_LEASE_SECONDS: i64 = 300;
const DEFAULT_RETRY_BACKOFF_BASE_MS: u64 = 1_000;
const DEFAULT_RETRY_BACKOFF_CAP_MS: u64 = 5 * 60 * 1_000;

struct Inner {
    tasks: HashMap<Uuid, Task>,
    visible_at: HashMap<Uuid, DateTime<Utc>>,
    companies: HashMap<String, Company>,
    sources: HashMap<Uuid, JobSource>,
    listings: HashMap<Uuid, JobListing>,
    matches: Vec<JobMatch>,
    config_blobs: HashMap<String, Value>,
    daily_search_count: u32,
    ai_usage: HashMap<Uuid, (u64, u64)>,
    max_spawn_depth: u32,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new(config_blobs: HashMap<String, Value>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                tasks: HashMap::new(),
                visible_at: HashMap::new(),
                companies: HashMap::new(),
                sources: HashMap::new(),
                listings: HashMap::new(),
                matches: Vec::new(),
                config_blobs,
                daily_search_count: 0,
                ai_usage: HashMap::new(),
                max_spawn_depth: DEFAULT_MAX_SPAWN_DEPTH,
            }),
        }
    }

    pub fn with_max_spawn_depth(mut self, depth: u32) -> Self {
        self.inner.get_mut().unwrap().max_spawn_depth = depth;
        self
    }

    /// Directly seed a task, bypassing `try_spawn`'s checks — used by tests
    /// to set up root tasks the way the external intake API would.
    pub fn seed_task(&self, task: Task) {
        let mut inner = self.inner.write().unwrap();
        let visible_at = task.created_at;
        inner.visible_at.insert(task.id, visible_at);
        inner.tasks.insert(task.id, task);
    }

    pub fn seed_company(&self, company: Company) {
        let mut inner = self.inner.write().unwrap();
        let key = normalize_company_name(&company.name);
        inner.companies.insert(key, company);
    }

    pub fn get_task_sync(&self, task_id: Uuid) -> Option<Task> {
        self.inner.read().unwrap().tasks.get(&task_id).cloned()
    }

    pub fn get_company_sync(&self, normalized_name: &str) -> Option<Company> {
        self.inner.read().unwrap().companies.get(normalized_name).cloned()
    }

    pub fn get_listing_sync(&self, listing_id: Uuid) -> Option<JobListing> {
        self.inner.read().unwrap().listings.get(&listing_id).cloned()
    }

    pub fn matches_sync(&self) -> Vec<JobMatch> {
        self.inner.read().unwrap().matches.clone()
    }

    pub fn all_tasks_sync(&self) -> Vec<Task> {
        self.inner.read().unwrap().tasks.values().cloned().collect()
    }

    pub fn sources_sync(&self) -> Vec<JobSource> {
        self.inner.read().unwrap().sources.values().cloned().collect()
    }
}

impl Inner {
    fn sibling_exists(&self, tracking_id: Uuid, kind: TaskKind, key: &str, terminal: bool) -> bool {
        self.tasks.values().any(|t| {
            t.tracking_id == tracking_id
                && t.kind == kind
                && dedupe_key(&t.payload).as_deref() == Some(key)
                && (t.status.is_terminal() == terminal || (!terminal && !t.status.is_terminal()))
        })
    }

    fn ancestor_targets(&self, ancestry: &[Uuid]) -> Vec<(Uuid, TaskKind, String)> {
        ancestry
            .iter()
            .filter_map(|id| {
                let task = self.tasks.get(id)?;
                let key = dedupe_key(&task.payload)?;
                Some((*id, task.kind, key))
            })
            .collect()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn claim_ready(&self, worker_id: &str, limit: i64) -> jobforge_core::store::Result<Vec<ClaimedTask>> {
        let mut inner = self.inner.write().unwrap();
        let now = Utc::now();

        let mut ready_ids: Vec<Uuid> = inner
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .filter(|t| inner.visible_at.get(&t.id).map(|v| *v <= now).unwrap_or(true))
            .map(|t| t.id)
            .collect();
        ready_ids.sort_by_key(|id| inner.tasks[id].created_at);
        ready_ids.truncate(limit.max(0) as usize);

        let mut claimed = Vec::with_capacity(ready_ids.len());
        for id in ready_ids {
            let task = inner.tasks.get_mut(&id).expect("id came from this map");
            validate_task_transition(task.status, TaskStatus::Processing)?;
            task.status = TaskStatus::Processing;
            task.updated_at = now;
            let lease_expires_at = now + chrono::Duration::seconds(DEFAULT_LEASE_SECONDS);
            task.attempts.push(Attempt {
                leased_at: now,
                worker_id: worker_id.to_string(),
                outcome: None,
            });
            claimed.push(ClaimedTask {
                task: task.clone(),
                leased_at: now,
                lease_expires_at,
            });
        }
        Ok(claimed)
    }

    async fn heartbeat(&self, task_id: Uuid) -> jobforge_core::store::Result<()> {
        let mut inner = self.inner.write().unwrap();
        let task = inner
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_succeeded(&self, task_id: Uuid) -> jobforge_core::store::Result<()> {
        let mut inner = self.inner.write().unwrap();
        let now = Utc::now();
        let task = inner
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        validate_task_transition(task.status, TaskStatus::Success)?;
        task.status = TaskStatus::Success;
        task.updated_at = now;
        task.completed_at = Some(now);
        if let Some(attempt) = task.attempts.last_mut() {
            attempt.outcome = Some(AttemptOutcome {
                finished_at: now,
                status: TaskStatus::Success,
                error_category: None,
                error_details: None,
            });
        }
        Ok(())
    }

    async fn mark_filtered(&self, task_id: Uuid, reason: &str) -> jobforge_core::store::Result<()> {
        self.terminalize(task_id, TaskStatus::Filtered, reason).await
    }

    async fn mark_skipped(&self, task_id: Uuid, reason: &str) -> jobforge_core::store::Result<()> {
        self.terminalize(task_id, TaskStatus::Skipped, reason).await
    }

    async fn mark_failed(&self, task_id: Uuid, error_details: &str) -> jobforge_core::store::Result<()> {
        let mut inner = self.inner.write().unwrap();
        let now = Utc::now();
        let task = inner
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        validate_task_transition(task.status, TaskStatus::Failed)?;

        task.retry_count += 1;
        if let Some(attempt) = task.attempts.last_mut() {
            attempt.outcome = Some(AttemptOutcome {
                finished_at: now,
                status: TaskStatus::Failed,
                error_category: None,
                error_details: Some(error_details.to_string()),
            });
        }

        if task.retry_count <= task.max_retries {
            // Internal Failed -> Pending retry (spec §4.1): observable only
            // as the incremented `retry_count`, not a new task id.
            task.status = TaskStatus::Pending;
            task.updated_at = now;
            let scheduled = not_before(now, task.retry_count, DEFAULT_RETRY_BACKOFF_BASE_MS, DEFAULT_RETRY_BACKOFF_CAP_MS);
            inner.visible_at.insert(task_id, scheduled);
        } else {
            task.status = TaskStatus::Failed;
            task.updated_at = now;
            task.completed_at = Some(now);
        }
        Ok(())
    }

    async fn requeue_self(
        &self,
        task_id: Uuid,
        company_wait_retries: u32,
        not_before_ts: DateTime<Utc>,
        payload_override: Option<TaskPayload>,
    ) -> jobforge_core::store::Result<Uuid> {
        let mut inner = self.inner.write().unwrap();
        let now = Utc::now();
        let original = inner
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;

        let new_id = Uuid::new_v4();
        let mut requeued = Task {
            id: new_id,
            kind: original.kind,
            status: TaskStatus::Pending,
            payload: payload_override.unwrap_or_else(|| original.payload.clone()),
            pipeline_state: original.pipeline_state.clone(),
            tracking_id: original.tracking_id,
            ancestry_chain: original.ancestry_chain.clone(),
            spawn_depth: original.spawn_depth,
            retry_count: 0,
            max_retries: original.max_retries,
            attempts: Vec::new(),
            depends_on_task_id: original.depends_on_task_id,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        requeued.pipeline_state.company_wait_retries = company_wait_retries;
        inner.visible_at.insert(new_id, not_before_ts);
        inner.tasks.insert(new_id, requeued);

        // The original attempt completes Success-by-requeue (spec §4.9 step 3).
        if let Some(original_mut) = inner.tasks.get_mut(&task_id) {
            validate_task_transition(original_mut.status, TaskStatus::Success)?;
            original_mut.status = TaskStatus::Success;
            original_mut.updated_at = now;
            original_mut.completed_at = Some(now);
            if let Some(attempt) = original_mut.attempts.last_mut() {
                attempt.outcome = Some(AttemptOutcome {
                    finished_at: now,
                    status: TaskStatus::Success,
                    error_category: None,
                    error_details: Some("requeued pending company data".to_string()),
                });
            }
        }
        Ok(new_id)
    }

    async fn try_spawn(
        &self,
        parent_id: Uuid,
        payload: TaskPayload,
        max_retries: u32,
    ) -> jobforge_core::store::Result<std::result::Result<Uuid, SpawnRejection>> {
        let mut inner = self.inner.write().unwrap();
        let now = Utc::now();
        let parent = inner
            .tasks
            .get(&parent_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(parent_id.to_string()))?;

        let child_kind = payload.kind();
        let child_key = dedupe_key(&payload);
        let ancestor_targets = inner.ancestor_targets(&parent.ancestry_chain.0);
        let has_sibling = child_key
            .as_deref()
            .map(|key| inner.sibling_exists(parent.tracking_id, child_kind, key, false))
            .unwrap_or(false);
        let terminal_in_lineage = child_key
            .as_deref()
            .map(|key| inner.sibling_exists(parent.tracking_id, child_kind, key, true))
            .unwrap_or(false);

        let ctx = SpawnContext {
            parent_ancestry: &parent.ancestry_chain,
            parent_depth: parent.spawn_depth,
            max_spawn_depth: inner.max_spawn_depth,
            ancestor_target_urls: &ancestor_targets,
            has_pending_or_processing_sibling: has_sibling,
            target_already_terminal_in_lineage: terminal_in_lineage,
        };

        if let Err(rejection) = check_spawn_safety(child_kind, child_key.as_deref(), &ctx) {
            return Ok(Err(rejection));
        }

        let child = Task::new_child(Uuid::new_v4(), &parent, payload, max_retries, now);
        let child_id = child.id;
        inner.visible_at.insert(child_id, now);
        inner.tasks.insert(child_id, child);
        Ok(Ok(child_id))
    }

    async fn get_task(&self, task_id: Uuid) -> jobforge_core::store::Result<Task> {
        self.inner
            .read()
            .unwrap()
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))
    }

    async fn submit_task(&self, payload: TaskPayload, max_retries: u32) -> jobforge_core::store::Result<Uuid> {
        let mut inner = self.inner.write().unwrap();
        let now = Utc::now();
        let task = Task::new_root(Uuid::new_v4(), payload, max_retries, now);
        let task_id = task.id;
        inner.visible_at.insert(task_id, now);
        inner.tasks.insert(task_id, task);
        Ok(task_id)
    }

    async fn get_company_by_name(&self, normalized_name: &str) -> jobforge_core::store::Result<Option<Company>> {
        Ok(self.inner.read().unwrap().companies.get(normalized_name).cloned())
    }

    async fn upsert_company(&self, company: &Company) -> jobforge_core::store::Result<()> {
        let key = normalize_company_name(&company.name);
        self.inner.write().unwrap().companies.insert(key, company.clone());
        Ok(())
    }

    async fn transition_company_status(
        &self,
        normalized_name: &str,
        to: AnalysisStatus,
    ) -> jobforge_core::store::Result<()> {
        let mut inner = self.inner.write().unwrap();
        let company = inner
            .companies
            .get_mut(normalized_name)
            .ok_or_else(|| StoreError::NotFound(normalized_name.to_string()))?;
        if !company.analysis_status.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                from: format!("{:?}", company.analysis_status),
                to: format!("{to:?}"),
            });
        }
        company.analysis_status = to;
        company.updated_at = Utc::now();
        Ok(())
    }

    async fn get_source(&self, source_id: Uuid) -> jobforge_core::store::Result<JobSource> {
        self.inner
            .read()
            .unwrap()
            .sources
            .get(&source_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(source_id.to_string()))
    }

    async fn insert_source(&self, source: &JobSource) -> jobforge_core::store::Result<Uuid> {
        let mut inner = self.inner.write().unwrap();
        inner.sources.insert(source.id, source.clone());
        Ok(source.id)
    }

    async fn record_source_outcome(&self, source_id: Uuid, success: bool) -> jobforge_core::store::Result<()> {
        let mut inner = self.inner.write().unwrap();
        let now = Utc::now();
        let source = inner
            .sources
            .get_mut(&source_id)
            .ok_or_else(|| StoreError::NotFound(source_id.to_string()))?;
        if success {
            source.record_success(now);
        } else {
            source.record_failure(now);
        }
        Ok(())
    }

    async fn find_source_by_url(&self, normalized_url_str: &str) -> jobforge_core::store::Result<Option<JobSource>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .sources
            .values()
            .find(|s| normalize_url(&s.config.url) == normalized_url_str)
            .cloned())
    }

    async fn find_listing_by_normalized_url(
        &self,
        normalized_url_str: &str,
    ) -> jobforge_core::store::Result<Option<JobListing>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .listings
            .values()
            .find(|l| normalize_url(&l.url) == normalized_url_str)
            .cloned())
    }

    async fn insert_listing(&self, listing: &JobListing) -> jobforge_core::store::Result<Uuid> {
        let mut inner = self.inner.write().unwrap();
        let normalized = normalize_url(&listing.url);
        if inner.listings.values().any(|l| normalize_url(&l.url) == normalized) {
            return Err(StoreError::Conflict(format!("duplicate normalized url: {normalized}")));
        }
        inner.listings.insert(listing.id, listing.clone());
        Ok(listing.id)
    }

    async fn update_listing(&self, listing: &JobListing) -> jobforge_core::store::Result<()> {
        self.inner.write().unwrap().listings.insert(listing.id, listing.clone());
        Ok(())
    }

    async fn get_listing(&self, listing_id: Uuid) -> jobforge_core::store::Result<JobListing> {
        self.inner
            .read()
            .unwrap()
            .listings
            .get(&listing_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(listing_id.to_string()))
    }

    async fn insert_match(&self, job_match: &JobMatch) -> jobforge_core::store::Result<()> {
        self.inner.write().unwrap().matches.push(job_match.clone());
        Ok(())
    }

    async fn config_snapshot(&self) -> jobforge_core::store::Result<ConfigSnapshot> {
        ConfigSnapshot::from_blobs(&self.inner.read().unwrap().config_blobs)
    }

    async fn increment_daily_search_count(&self) -> jobforge_core::store::Result<u32> {
        let mut inner = self.inner.write().unwrap();
        inner.daily_search_count += 1;
        Ok(inner.daily_search_count)
    }

    async fn record_ai_usage(&self, task_id: Uuid, tokens: u64, cost_cents: u64) -> jobforge_core::store::Result<()> {
        let mut inner = self.inner.write().unwrap();
        let entry = inner.ai_usage.entry(task_id).or_insert((0, 0));
        entry.0 += tokens;
        entry.1 += cost_cents;
        Ok(())
    }

    async fn has_pending_or_processing_sibling(
        &self,
        tracking_id: Uuid,
        target_url: &str,
        kind: TaskKind,
    ) -> jobforge_core::store::Result<bool> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .sibling_exists(tracking_id, kind, target_url, false))
    }

    async fn target_already_terminal_in_lineage(
        &self,
        tracking_id: Uuid,
        target_url: &str,
        kind: TaskKind,
    ) -> jobforge_core::store::Result<bool> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .sibling_exists(tracking_id, kind, target_url, true))
    }

    async fn ancestor_target_urls(
        &self,
        ancestry: &[Uuid],
    ) -> jobforge_core::store::Result<Vec<(Uuid, TaskKind, String)>> {
        Ok(self.inner.read().unwrap().ancestor_targets(ancestry))
    }

    async fn find_company_task_in_lineage(
        &self,
        tracking_id: Uuid,
        normalized_company_name: &str,
    ) -> jobforge_core::store::Result<Option<Task>> {
        Ok(self.inner.read().unwrap().tasks.values().find(|t| {
            t.tracking_id == tracking_id
                && t.kind == TaskKind::Company
                && matches!(&t.payload, TaskPayload::Company { company_name, .. }
                    if normalize_company_name(company_name) == normalized_company_name)
        }).cloned())
    }
}

impl MemoryStore {
    async fn terminalize(&self, task_id: Uuid, to: TaskStatus, reason: &str) -> jobforge_core::store::Result<()> {
        let mut inner = self.inner.write().unwrap();
        let now = Utc::now();
        let task = inner
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        validate_task_transition(task.status, to)?;
        task.status = to;
        task.updated_at = now;
        task.completed_at = Some(now);
        if let Some(attempt) = task.attempts.last_mut() {
            attempt.outcome = Some(AttemptOutcome {
                finished_at: now,
                status: to,
                error_category: None,
                error_details: Some(reason.to_string()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::full_config_blobs;

    fn store() -> MemoryStore {
        MemoryStore::new(full_config_blobs())
    }

    #[tokio::test]
    async fn claim_ready_is_fifo_and_marks_processing() {
        let store = store();
        let earlier = Task::new_root(
            Uuid::new_v4(),
            TaskPayload::Company { url: None, company_name: "Acme".into() },
            3,
            Utc::now() - chrono::Duration::seconds(10),
        );
        let later = Task::new_root(
            Uuid::new_v4(),
            TaskPayload::Company { url: None, company_name: "Beta".into() },
            3,
            Utc::now(),
        );
        let earlier_id = earlier.id;
        store.seed_task(earlier);
        store.seed_task(later);

        let claimed = store.claim_ready("w1", 10).await.unwrap();
        assert_eq!(claimed.len(), 2);
        assert_eq!(claimed[0].task.id, earlier_id);
        assert_eq!(claimed[0].task.status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn mark_failed_retries_then_terminates() {
        let store = store();
        let task = Task::new_root(
            Uuid::new_v4(),
            TaskPayload::Company { url: None, company_name: "Acme".into() },
            1,
            Utc::now(),
        );
        let id = task.id;
        store.seed_task(task);
        store.claim_ready("w1", 10).await.unwrap();

        store.mark_failed(id, "boom").await.unwrap();
        let after_first = store.get_task(id).await.unwrap();
        assert_eq!(after_first.status, TaskStatus::Pending);
        assert_eq!(after_first.retry_count, 1);

        // Second attempt: lease again then fail past max_retries=1.
        store.inner.write().unwrap().visible_at.insert(id, Utc::now() - chrono::Duration::seconds(1));
        store.claim_ready("w1", 10).await.unwrap();
        store.mark_failed(id, "boom again").await.unwrap();
        let terminal = store.get_task(id).await.unwrap();
        assert_eq!(terminal.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn try_spawn_rejects_duplicate_sibling() {
        let store = store();
        let parent = Task::new_root(
            Uuid::new_v4(),
            TaskPayload::JobListing { listing_id: None, scraped_data: None },
            3,
            Utc::now(),
        );
        let parent_id = parent.id;
        store.seed_task(parent);

        let child_payload = TaskPayload::Company {
            url: None,
            company_name: "Acme".into(),
        };
        let first = store.try_spawn(parent_id, child_payload.clone(), 3).await.unwrap();
        assert!(first.is_ok());

        let second = store.try_spawn(parent_id, child_payload, 3).await.unwrap();
        assert_eq!(second, Err(SpawnRejection::DuplicatePendingOrProcessingSibling));
    }

    #[tokio::test]
    async fn try_spawn_rejects_depth_exceeded() {
        let store = MemoryStore::new(full_config_blobs()).with_max_spawn_depth(0);
        let parent = Task::new_root(
            Uuid::new_v4(),
            TaskPayload::Company { url: None, company_name: "Acme".into() },
            3,
            Utc::now(),
        );
        let parent_id = parent.id;
        store.seed_task(parent);
        let result = store
            .try_spawn(parent_id, TaskPayload::ScrapeSource { source_id: Uuid::new_v4() }, 3)
            .await
            .unwrap();
        assert_eq!(result, Err(SpawnRejection::DepthExceeded));
    }

    #[tokio::test]
    async fn insert_listing_rejects_duplicate_normalized_url() {
        let store = store();
        let listing = JobListing {
            id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            company_id: None,
            url: "https://example.com/jobs/1".into(),
            title: "Engineer".into(),
            description: "d".into(),
            location: None,
            posted_date: None,
            salary_range: None,
            status: jobforge_core::listing::ListingStatus::Pending,
            extraction_result: None,
            scoring_result: None,
            match_score: None,
            created_at: Utc::now(),
        };
        store.insert_listing(&listing).await.unwrap();

        let mut dup = listing.clone();
        dup.id = Uuid::new_v4();
        dup.url = "https://example.com/jobs/1/?utm_source=x".into();
        let err = store.insert_listing(&dup).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn company_status_transition_rejects_illegal_jump() {
        let store = store();
        store.seed_company(Company::new("Acme"));
        let err = store
            .transition_company_status("acme", AnalysisStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }
}
