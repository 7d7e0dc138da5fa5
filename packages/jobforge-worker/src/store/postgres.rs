//! Durable Postgres-backed [`TaskStore`] (spec §2, §10.3). Each domain record
//! is persisted as a `jsonb` blob alongside the handful of plain columns a
//! query needs to filter on (status, `tracking_id`, normalized url); the
//! struct itself stays the single source of truth for shape, so adding a
//! field never requires a migration.
//!
//! Uses runtime `sqlx::query`/`query_scalar` rather than the compile-time
//! `query!` macros, since there is no database reachable at build time here.

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
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::backoff::not_before;
use crate::store::dedupe_key;

const DEFAULT_LEASE_SECONDS: i64 = 300;
const DEFAULT_RETRY_BACKOFF_BASE_MS: u64 = 1_000;
const DEFAULT_RETRY_BACKOFF_CAP_MS: u64 = 5 * 60 * 1_000;

fn backend_err(e: sqlx::Error) -> StoreError {
    StoreError::Backend(Box::new(e))
}

fn parse_err(e: serde_json::Error) -> StoreError {
    StoreError::Backend(Box::new(e))
}

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Processing => "processing",
        TaskStatus::Success => "success",
        TaskStatus::Filtered => "filtered",
        TaskStatus::Skipped => "skipped",
        TaskStatus::Failed => "failed",
    }
}

pub struct PostgresStore {
    pool: PgPool,
    max_spawn_depth: u32,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await.map_err(backend_err)?;
        Ok(Self { pool, max_spawn_depth: DEFAULT_MAX_SPAWN_DEPTH })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool, max_spawn_depth: DEFAULT_MAX_SPAWN_DEPTH }
    }

    pub fn with_max_spawn_depth(mut self, depth: u32) -> Self {
        self.max_spawn_depth = depth;
        self
    }

    /// Applies the schema in `migrations/0001_init.sql`. Exposed directly
    /// (rather than `sqlx::migrate!`) since this workspace carries one plain
    /// schema file, not a migration history.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        let schema = include_str!("../../migrations/0001_init.sql");
        sqlx::raw_sql(schema).execute(&self.pool).await.map_err(backend_err)?;
        Ok(())
    }

    async fn write_task(&self, task: &Task, executor: impl sqlx::PgExecutor<'_>) -> Result<(), StoreError> {
        let data = serde_json::to_value(task).map_err(parse_err)?;
        let key = dedupe_key(&task.payload);
        sqlx::query(
            "UPDATE tasks SET status = $1, tracking_id = $2, dedupe_key = $3, data = $4, updated_at = now() WHERE id = $5",
        )
        .bind(status_str(task.status))
        .bind(task.tracking_id)
        .bind(key)
        .bind(data)
        .bind(task.id)
        .execute(executor)
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn read_task(&self, row_data: Value) -> Result<Task, StoreError> {
        serde_json::from_value(row_data).map_err(parse_err)
    }
}

#[async_trait]
impl TaskStore for PostgresStore {
    async fn claim_ready(&self, worker_id: &str, limit: i64) -> jobforge_core::store::Result<Vec<ClaimedTask>> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let rows = sqlx::query(
            "SELECT data FROM tasks WHERE status = 'pending' AND visible_at <= now() \
             ORDER BY created_at ASC LIMIT $1 FOR UPDATE SKIP LOCKED",
        )
        .bind(limit)
        .fetch_all(&mut *tx)
        .await
        .map_err(backend_err)?;

        let now = Utc::now();
        let mut claimed = Vec::with_capacity(rows.len());
        for row in rows {
            let data: Value = row.try_get("data").map_err(backend_err)?;
            let mut task: Task = self.read_task(data).await?;
            validate_task_transition(task.status, TaskStatus::Processing)?;
            task.status = TaskStatus::Processing;
            task.updated_at = now;
            task.attempts.push(Attempt {
                leased_at: now,
                worker_id: worker_id.to_string(),
                outcome: None,
            });
            self.write_task(&task, &mut *tx).await?;
            let lease_expires_at = now + chrono::Duration::seconds(DEFAULT_LEASE_SECONDS);
            claimed.push(ClaimedTask { task, leased_at: now, lease_expires_at });
        }
        tx.commit().await.map_err(backend_err)?;
        Ok(claimed)
    }

    async fn heartbeat(&self, task_id: Uuid) -> jobforge_core::store::Result<()> {
        sqlx::query("UPDATE tasks SET updated_at = now() WHERE id = $1")
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn mark_succeeded(&self, task_id: Uuid) -> jobforge_core::store::Result<()> {
        self.terminalize(task_id, TaskStatus::Success, None).await
    }

    async fn mark_filtered(&self, task_id: Uuid, reason: &str) -> jobforge_core::store::Result<()> {
        self.terminalize(task_id, TaskStatus::Filtered, Some(reason)).await
    }

    async fn mark_skipped(&self, task_id: Uuid, reason: &str) -> jobforge_core::store::Result<()> {
        self.terminalize(task_id, TaskStatus::Skipped, Some(reason)).await
    }

    async fn mark_failed(&self, task_id: Uuid, error_details: &str) -> jobforge_core::store::Result<()> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let row = sqlx::query("SELECT data FROM tasks WHERE id = $1 FOR UPDATE")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend_err)?
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        let data: Value = row.try_get("data").map_err(backend_err)?;
        let mut task: Task = self.read_task(data).await?;
        validate_task_transition(task.status, TaskStatus::Failed)?;

        let now = Utc::now();
        task.retry_count += 1;
        if let Some(attempt) = task.attempts.last_mut() {
            attempt.outcome = Some(AttemptOutcome {
                finished_at: now,
                status: TaskStatus::Failed,
                error_category: None,
                error_details: Some(error_details.to_string()),
            });
        }

        let visible_at = if task.retry_count <= task.max_retries {
            task.status = TaskStatus::Pending;
            not_before(now, task.retry_count, DEFAULT_RETRY_BACKOFF_BASE_MS, DEFAULT_RETRY_BACKOFF_CAP_MS)
        } else {
            task.status = TaskStatus::Failed;
            task.completed_at = Some(now);
            now
        };
        task.updated_at = now;

        let data = serde_json::to_value(&task).map_err(parse_err)?;
        sqlx::query(
            "UPDATE tasks SET status = $1, data = $2, updated_at = now(), visible_at = $3, completed_at = $4 WHERE id = $5",
        )
        .bind(status_str(task.status))
        .bind(data)
        .bind(visible_at)
        .bind(task.completed_at)
        .bind(task_id)
        .execute(&mut *tx)
        .await
        .map_err(backend_err)?;
        tx.commit().await.map_err(backend_err)?;
        Ok(())
    }

    async fn requeue_self(
        &self,
        task_id: Uuid,
        company_wait_retries: u32,
        not_before_ts: DateTime<Utc>,
        payload_override: Option<TaskPayload>,
    ) -> jobforge_core::store::Result<Uuid> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let row = sqlx::query("SELECT data FROM tasks WHERE id = $1 FOR UPDATE")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend_err)?
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        let data: Value = row.try_get("data").map_err(backend_err)?;
        let original: Task = self.read_task(data).await?;

        let now = Utc::now();
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
        self.insert_task_row(&requeued, not_before_ts, &mut *tx).await?;

        validate_task_transition(original.status, TaskStatus::Success)?;
        let mut finished = original.clone();
        finished.status = TaskStatus::Success;
        finished.updated_at = now;
        finished.completed_at = Some(now);
        if let Some(attempt) = finished.attempts.last_mut() {
            attempt.outcome = Some(AttemptOutcome {
                finished_at: now,
                status: TaskStatus::Success,
                error_category: None,
                error_details: Some("requeued pending company data".to_string()),
            });
        }
        self.write_task(&finished, &mut *tx).await?;
        tx.commit().await.map_err(backend_err)?;
        Ok(new_id)
    }

    async fn try_spawn(
        &self,
        parent_id: Uuid,
        payload: TaskPayload,
        max_retries: u32,
    ) -> jobforge_core::store::Result<std::result::Result<Uuid, SpawnRejection>> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let row = sqlx::query("SELECT data FROM tasks WHERE id = $1")
            .bind(parent_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend_err)?
            .ok_or_else(|| StoreError::NotFound(parent_id.to_string()))?;
        let data: Value = row.try_get("data").map_err(backend_err)?;
        let parent: Task = self.read_task(data).await?;

        let child_kind = payload.kind();
        let child_key = dedupe_key(&payload);

        let ancestor_rows = sqlx::query("SELECT id, dedupe_key FROM tasks WHERE id = ANY($1) AND dedupe_key IS NOT NULL")
            .bind(&parent.ancestry_chain.0)
            .fetch_all(&mut *tx)
            .await
            .map_err(backend_err)?;
        let mut ancestor_target_urls = Vec::new();
        for row in &ancestor_rows {
            let id: Uuid = row.try_get("id").map_err(backend_err)?;
            let key: String = row.try_get("dedupe_key").map_err(backend_err)?;
            ancestor_target_urls.push((id, child_kind, key));
        }

        let (has_sibling, terminal_in_lineage) = if let Some(key) = &child_key {
            let sibling = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM tasks WHERE tracking_id = $1 AND dedupe_key = $2 \
                 AND status IN ('pending', 'processing'))",
            )
            .bind(parent.tracking_id)
            .bind(key)
            .fetch_one(&mut *tx)
            .await
            .map_err(backend_err)?;
            let terminal = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM tasks WHERE tracking_id = $1 AND dedupe_key = $2 \
                 AND status IN ('success', 'filtered', 'skipped', 'failed'))",
            )
            .bind(parent.tracking_id)
            .bind(key)
            .fetch_one(&mut *tx)
            .await
            .map_err(backend_err)?;
            (sibling, terminal)
        } else {
            (false, false)
        };

        let ctx = SpawnContext {
            parent_ancestry: &parent.ancestry_chain,
            parent_depth: parent.spawn_depth,
            max_spawn_depth: self.max_spawn_depth,
            ancestor_target_urls: &ancestor_target_urls,
            has_pending_or_processing_sibling: has_sibling,
            target_already_terminal_in_lineage: terminal_in_lineage,
        };

        if let Err(rejection) = check_spawn_safety(child_kind, child_key.as_deref(), &ctx) {
            return Ok(Err(rejection));
        }

        let child = Task::new_child(Uuid::new_v4(), &parent, payload, max_retries, Utc::now());
        let child_id = child.id;
        self.insert_task_row(&child, child.created_at, &mut *tx).await?;
        tx.commit().await.map_err(backend_err)?;
        Ok(Ok(child_id))
    }

    async fn submit_task(&self, payload: TaskPayload, max_retries: u32) -> jobforge_core::store::Result<Uuid> {
        let now = Utc::now();
        let task = Task::new_root(Uuid::new_v4(), payload, max_retries, now);
        let task_id = task.id;
        self.insert_task_row(&task, now, &self.pool).await?;
        Ok(task_id)
    }

    async fn get_task(&self, task_id: Uuid) -> jobforge_core::store::Result<Task> {
        let row = sqlx::query("SELECT data FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        let data: Value = row.try_get("data").map_err(backend_err)?;
        self.read_task(data).await
    }

    async fn get_company_by_name(&self, normalized_name: &str) -> jobforge_core::store::Result<Option<Company>> {
        let row = sqlx::query("SELECT data FROM companies WHERE normalized_name = $1")
            .bind(normalized_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        match row {
            Some(row) => {
                let data: Value = row.try_get("data").map_err(backend_err)?;
                Ok(Some(serde_json::from_value(data).map_err(parse_err)?))
            }
            None => Ok(None),
        }
    }

    async fn upsert_company(&self, company: &Company) -> jobforge_core::store::Result<()> {
        let key = normalize_company_name(&company.name);
        let data = serde_json::to_value(company).map_err(parse_err)?;
        let status = match company.analysis_status {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Analyzing => "analyzing",
            AnalysisStatus::Active => "active",
            AnalysisStatus::Failed => "failed",
        };
        sqlx::query(
            "INSERT INTO companies (normalized_name, analysis_status, data) VALUES ($1, $2, $3) \
             ON CONFLICT (normalized_name) DO UPDATE SET analysis_status = $2, data = $3",
        )
        .bind(&key)
        .bind(status)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn transition_company_status(
        &self,
        normalized_name: &str,
        to: AnalysisStatus,
    ) -> jobforge_core::store::Result<()> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let row = sqlx::query("SELECT data FROM companies WHERE normalized_name = $1 FOR UPDATE")
            .bind(normalized_name)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend_err)?
            .ok_or_else(|| StoreError::NotFound(normalized_name.to_string()))?;
        let data: Value = row.try_get("data").map_err(backend_err)?;
        let mut company: Company = serde_json::from_value(data).map_err(parse_err)?;
        if !company.analysis_status.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                from: format!("{:?}", company.analysis_status),
                to: format!("{to:?}"),
            });
        }
        company.analysis_status = to;
        company.updated_at = Utc::now();
        let status = match to {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Analyzing => "analyzing",
            AnalysisStatus::Active => "active",
            AnalysisStatus::Failed => "failed",
        };
        let data = serde_json::to_value(&company).map_err(parse_err)?;
        sqlx::query("UPDATE companies SET analysis_status = $1, data = $2 WHERE normalized_name = $3")
            .bind(status)
            .bind(data)
            .bind(normalized_name)
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;
        tx.commit().await.map_err(backend_err)?;
        Ok(())
    }

    async fn get_source(&self, source_id: Uuid) -> jobforge_core::store::Result<JobSource> {
        let row = sqlx::query("SELECT data FROM sources WHERE id = $1")
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?
            .ok_or_else(|| StoreError::NotFound(source_id.to_string()))?;
        let data: Value = row.try_get("data").map_err(backend_err)?;
        serde_json::from_value(data).map_err(parse_err)
    }

    async fn insert_source(&self, source: &JobSource) -> jobforge_core::store::Result<Uuid> {
        let normalized = normalize_url(&source.config.url);
        let data = serde_json::to_value(source).map_err(parse_err)?;
        sqlx::query(
            "INSERT INTO sources (id, normalized_url, status, data) VALUES ($1, $2, $3, $4)",
        )
        .bind(source.id)
        .bind(&normalized)
        .bind(format!("{:?}", source.status).to_lowercase())
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;
        Ok(source.id)
    }

    async fn record_source_outcome(&self, source_id: Uuid, success: bool) -> jobforge_core::store::Result<()> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let row = sqlx::query("SELECT data FROM sources WHERE id = $1 FOR UPDATE")
            .bind(source_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend_err)?
            .ok_or_else(|| StoreError::NotFound(source_id.to_string()))?;
        let data: Value = row.try_get("data").map_err(backend_err)?;
        let mut source: JobSource = serde_json::from_value(data).map_err(parse_err)?;
        let now = Utc::now();
        if success {
            source.record_success(now);
        } else {
            source.record_failure(now);
        }
        let data = serde_json::to_value(&source).map_err(parse_err)?;
        sqlx::query("UPDATE sources SET status = $1, data = $2 WHERE id = $3")
            .bind(format!("{:?}", source.status).to_lowercase())
            .bind(data)
            .bind(source_id)
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;
        tx.commit().await.map_err(backend_err)?;
        Ok(())
    }

    async fn find_source_by_url(&self, normalized_url_str: &str) -> jobforge_core::store::Result<Option<JobSource>> {
        let row = sqlx::query("SELECT data FROM sources WHERE normalized_url = $1 LIMIT 1")
            .bind(normalized_url_str)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        match row {
            Some(row) => {
                let data: Value = row.try_get("data").map_err(backend_err)?;
                Ok(Some(serde_json::from_value(data).map_err(parse_err)?))
            }
            None => Ok(None),
        }
    }

    async fn find_listing_by_normalized_url(
        &self,
        normalized_url_str: &str,
    ) -> jobforge_core::store::Result<Option<JobListing>> {
        let row = sqlx::query("SELECT data FROM listings WHERE normalized_url = $1 LIMIT 1")
            .bind(normalized_url_str)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        match row {
            Some(row) => {
                let data: Value = row.try_get("data").map_err(backend_err)?;
                Ok(Some(serde_json::from_value(data).map_err(parse_err)?))
            }
            None => Ok(None),
        }
    }

    async fn insert_listing(&self, listing: &JobListing) -> jobforge_core::store::Result<Uuid> {
        let normalized = normalize_url(&listing.url);
        let data = serde_json::to_value(listing).map_err(parse_err)?;
        sqlx::query("INSERT INTO listings (id, normalized_url, data) VALUES ($1, $2, $3)")
            .bind(listing.id)
            .bind(&normalized)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return StoreError::Conflict(format!("duplicate normalized url: {normalized}"));
                    }
                }
                backend_err(e)
            })?;
        Ok(listing.id)
    }

    async fn update_listing(&self, listing: &JobListing) -> jobforge_core::store::Result<()> {
        let normalized = normalize_url(&listing.url);
        let data = serde_json::to_value(listing).map_err(parse_err)?;
        sqlx::query("UPDATE listings SET normalized_url = $1, data = $2 WHERE id = $3")
            .bind(&normalized)
            .bind(data)
            .bind(listing.id)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn get_listing(&self, listing_id: Uuid) -> jobforge_core::store::Result<JobListing> {
        let row = sqlx::query("SELECT data FROM listings WHERE id = $1")
            .bind(listing_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?
            .ok_or_else(|| StoreError::NotFound(listing_id.to_string()))?;
        let data: Value = row.try_get("data").map_err(backend_err)?;
        serde_json::from_value(data).map_err(parse_err)
    }

    async fn insert_match(&self, job_match: &JobMatch) -> jobforge_core::store::Result<()> {
        let data = serde_json::to_value(job_match).map_err(parse_err)?;
        sqlx::query("INSERT INTO matches (id, data) VALUES (gen_random_uuid(), $1)")
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn config_snapshot(&self) -> jobforge_core::store::Result<ConfigSnapshot> {
        let rows = sqlx::query("SELECT key, value FROM config_blobs")
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;
        let mut blobs = std::collections::HashMap::new();
        for row in rows {
            let key: String = row.try_get("key").map_err(backend_err)?;
            let value: Value = row.try_get("value").map_err(backend_err)?;
            blobs.insert(key, value);
        }
        ConfigSnapshot::from_blobs(&blobs)
    }

    async fn increment_daily_search_count(&self) -> jobforge_core::store::Result<u32> {
        let count: i32 = sqlx::query_scalar(
            "INSERT INTO daily_search_counter (day, count) VALUES (current_date, 1) \
             ON CONFLICT (day) DO UPDATE SET count = daily_search_counter.count + 1 \
             RETURNING count",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(backend_err)?;
        Ok(count as u32)
    }

    async fn record_ai_usage(&self, task_id: Uuid, tokens: u64, cost_cents: u64) -> jobforge_core::store::Result<()> {
        sqlx::query(
            "INSERT INTO ai_usage (task_id, tokens, cost_cents) VALUES ($1, $2, $3) \
             ON CONFLICT (task_id) DO UPDATE SET tokens = ai_usage.tokens + $2, cost_cents = ai_usage.cost_cents + $3",
        )
        .bind(task_id)
        .bind(tokens as i64)
        .bind(cost_cents as i64)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn has_pending_or_processing_sibling(
        &self,
        tracking_id: Uuid,
        target_url: &str,
        _kind: TaskKind,
    ) -> jobforge_core::store::Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE tracking_id = $1 AND dedupe_key = $2 \
             AND status IN ('pending', 'processing'))",
        )
        .bind(tracking_id)
        .bind(target_url)
        .fetch_one(&self.pool)
        .await
        .map_err(backend_err)
    }

    async fn target_already_terminal_in_lineage(
        &self,
        tracking_id: Uuid,
        target_url: &str,
        _kind: TaskKind,
    ) -> jobforge_core::store::Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE tracking_id = $1 AND dedupe_key = $2 \
             AND status IN ('success', 'filtered', 'skipped', 'failed'))",
        )
        .bind(tracking_id)
        .bind(target_url)
        .fetch_one(&self.pool)
        .await
        .map_err(backend_err)
    }

    async fn ancestor_target_urls(
        &self,
        ancestry: &[Uuid],
    ) -> jobforge_core::store::Result<Vec<(Uuid, TaskKind, String)>> {
        let rows = sqlx::query("SELECT id, data, dedupe_key FROM tasks WHERE id = ANY($1) AND dedupe_key IS NOT NULL")
            .bind(ancestry)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.try_get("id").map_err(backend_err)?;
            let key: String = row.try_get("dedupe_key").map_err(backend_err)?;
            let data: Value = row.try_get("data").map_err(backend_err)?;
            let task: Task = self.read_task(data).await?;
            out.push((id, task.kind, key));
        }
        Ok(out)
    }

    async fn find_company_task_in_lineage(
        &self,
        tracking_id: Uuid,
        normalized_company_name: &str,
    ) -> jobforge_core::store::Result<Option<Task>> {
        let target_key = format!("company:{normalized_company_name}");
        let row = sqlx::query(
            "SELECT data FROM tasks WHERE tracking_id = $1 AND dedupe_key = $2 LIMIT 1",
        )
        .bind(tracking_id)
        .bind(&target_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;
        match row {
            Some(row) => {
                let data: Value = row.try_get("data").map_err(backend_err)?;
                Ok(Some(self.read_task(data).await?))
            }
            None => {
                // A company payload with a hint url (not the synthetic
                // `company:` key) won't match above; fall back to a scan.
                let rows = sqlx::query("SELECT data FROM tasks WHERE tracking_id = $1 AND data->>'kind' = 'company'")
                    .bind(tracking_id)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(backend_err)?;
                for row in rows {
                    let data: Value = row.try_get("data").map_err(backend_err)?;
                    let task: Task = self.read_task(data).await?;
                    if let TaskPayload::Company { company_name, .. } = &task.payload {
                        if normalize_company_name(company_name) == normalized_company_name {
                            return Ok(Some(task));
                        }
                    }
                }
                Ok(None)
            }
        }
    }
}

impl PostgresStore {
    async fn terminalize(
        &self,
        task_id: Uuid,
        to: TaskStatus,
        reason: Option<&str>,
    ) -> jobforge_core::store::Result<()> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let row = sqlx::query("SELECT data FROM tasks WHERE id = $1 FOR UPDATE")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend_err)?
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        let data: Value = row.try_get("data").map_err(backend_err)?;
        let mut task: Task = self.read_task(data).await?;
        validate_task_transition(task.status, to)?;

        let now = Utc::now();
        task.status = to;
        task.updated_at = now;
        task.completed_at = Some(now);
        if let Some(attempt) = task.attempts.last_mut() {
            attempt.outcome = Some(AttemptOutcome {
                finished_at: now,
                status: to,
                error_category: None,
                error_details: reason.map(str::to_string),
            });
        }
        self.write_task(&task, &mut *tx).await?;
        tx.commit().await.map_err(backend_err)?;
        Ok(())
    }

    async fn insert_task_row(
        &self,
        task: &Task,
        visible_at: DateTime<Utc>,
        executor: impl sqlx::PgExecutor<'_>,
    ) -> Result<(), StoreError> {
        let data = serde_json::to_value(task).map_err(parse_err)?;
        let key = dedupe_key(&task.payload);
        sqlx::query(
            "INSERT INTO tasks (id, status, tracking_id, dedupe_key, visible_at, created_at, data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(task.id)
        .bind(status_str(task.status))
        .bind(task.tracking_id)
        .bind(key)
        .bind(visible_at)
        .bind(task.created_at)
        .bind(data)
        .execute(executor)
        .await
        .map_err(backend_err)?;
        Ok(())
    }
}
