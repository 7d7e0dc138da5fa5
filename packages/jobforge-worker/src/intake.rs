//! Intake contract (spec §6): the three thin constructors an external HTTP
//! API layer calls to get work into the queue. Each builds the matching root
//! `TaskPayload` and persists it via `TaskStore::submit_task`; none of them
//! touch a listing, company, or source record directly; that happens when
//! the task is later claimed and processed.

use jobforge_core::store::TaskStore;
use jobforge_core::task::{ScrapedJobData, TaskPayload};
use uuid::Uuid;

/// Caller-supplied facts about a job posting, gathered by the HTTP layer
/// (e.g. by fetching `url` itself) before calling `submit_job`. Maps onto
/// the legacy manual-submission shape (spec §9 back-compat): a listing
/// materializes straight from these fields rather than from a scrape.
#[derive(Debug, Clone, Default)]
pub struct JobMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub posted_date: Option<String>,
    pub salary: Option<String>,
}

/// Submits a job posting URL for ingestion. `company_name`, when given, is
/// used for company lookup/creation the same way a scraped job's source
/// `company_name` is; `metadata` carries whatever the caller already knows
/// about the posting. Fields left unset fall back to the bare url/empty
/// string, same as any other under-specified scrape.
pub async fn submit_job(
    store: &dyn TaskStore,
    max_retries: u32,
    url: String,
    company_name: Option<String>,
    metadata: Option<JobMetadata>,
) -> jobforge_core::store::Result<Uuid> {
    let metadata = metadata.unwrap_or_default();
    let scraped_data = ScrapedJobData {
        title: metadata.title.unwrap_or_else(|| url.clone()),
        company: company_name,
        location: metadata.location,
        description: metadata.description.unwrap_or_default(),
        url,
        posted_date: metadata.posted_date,
        salary: metadata.salary,
    };
    let payload = TaskPayload::JobListing { listing_id: None, scraped_data: Some(scraped_data) };
    store.submit_task(payload, max_retries).await
}

/// Submits a company for background analysis (spec §4.7), optionally
/// seeded with a known URL (e.g. its careers page or homepage).
pub async fn submit_company(
    store: &dyn TaskStore,
    max_retries: u32,
    name: String,
    url: Option<String>,
) -> jobforge_core::store::Result<Uuid> {
    let payload = TaskPayload::Company { url, company_name: name };
    store.submit_task(payload, max_retries).await
}

/// Submits a scrape run against an already-registered `JobSource` (spec
/// §4.8). Use source discovery (run by the source processor off a
/// `Company`'s resolved website) to register a source first.
pub async fn submit_scrape(store: &dyn TaskStore, max_retries: u32, source_id: Uuid) -> jobforge_core::store::Result<Uuid> {
    let payload = TaskPayload::ScrapeSource { source_id };
    store.submit_task(payload, max_retries).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::full_config_blobs;
    use crate::store::MemoryStore;
    use jobforge_core::task::TaskStatus;

    #[tokio::test]
    async fn submit_job_persists_a_pending_legacy_listing_task() {
        let store = MemoryStore::new(full_config_blobs());
        let task_id = submit_job(
            &store,
            3,
            "https://example.com/jobs/1".to_string(),
            Some("ExampleCo".to_string()),
            Some(JobMetadata {
                title: Some("Senior Rust Engineer".to_string()),
                description: Some("Build our platform.".to_string()),
                location: Some("Remote".to_string()),
                posted_date: None,
                salary: None,
            }),
        )
        .await
        .expect("submit_job persists a task");

        let task = store.get_task(task_id).await.expect("task readable");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.tracking_id, task.id, "a submitted task is its own root");
        assert!(task.ancestry_chain.0.is_empty());
        let TaskPayload::JobListing { listing_id, scraped_data } = &task.payload else {
            panic!("expected a JobListing payload");
        };
        assert!(listing_id.is_none());
        let data = scraped_data.as_ref().expect("scraped_data present");
        assert_eq!(data.title, "Senior Rust Engineer");
        assert_eq!(data.company.as_deref(), Some("ExampleCo"));
    }

    #[tokio::test]
    async fn submit_job_without_metadata_falls_back_to_the_bare_url() {
        let store = MemoryStore::new(full_config_blobs());
        let task_id = submit_job(&store, 3, "https://example.com/jobs/2".to_string(), None, None)
            .await
            .expect("submit_job persists a task");

        let task = store.get_task(task_id).await.expect("task readable");
        let TaskPayload::JobListing { scraped_data, .. } = &task.payload else {
            panic!("expected a JobListing payload");
        };
        let data = scraped_data.as_ref().expect("scraped_data present");
        assert_eq!(data.title, "https://example.com/jobs/2");
        assert_eq!(data.description, "");
    }

    #[tokio::test]
    async fn submit_company_persists_a_pending_company_task() {
        let store = MemoryStore::new(full_config_blobs());
        let task_id = submit_company(&store, 3, "NewCo".to_string(), Some("https://newco.example.com".to_string()))
            .await
            .expect("submit_company persists a task");

        let task = store.get_task(task_id).await.expect("task readable");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(matches!(
            task.payload,
            TaskPayload::Company { ref company_name, .. } if company_name == "NewCo"
        ));
    }

    #[tokio::test]
    async fn submit_scrape_persists_a_pending_scrape_source_task() {
        let store = MemoryStore::new(full_config_blobs());
        let source_id = Uuid::new_v4();
        let task_id = submit_scrape(&store, 3, source_id).await.expect("submit_scrape persists a task");

        let task = store.get_task(task_id).await.expect("task readable");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(matches!(task.payload, TaskPayload::ScrapeSource { source_id: sid } if sid == source_id));
    }
}
