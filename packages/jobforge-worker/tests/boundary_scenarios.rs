//! Integration coverage for a subset of the concrete boundary scenarios
//! named in the spec's testable-properties section: Greenhouse ingestion
//! (a hard-rejected job never reaches a Pending job-listing task) and
//! source auto-disable after consecutive scrape failures. These drive the
//! real `source` processor end to end against a stubbed HTTP source and the
//! in-memory store, rather than unit-testing its pure helpers in isolation.

use std::sync::Arc;

use jobforge_ai::AgentManager;
use jobforge_core::company::Company;
use jobforge_core::config::ConfigSnapshot;
use jobforge_core::source::{JobSource, SourceConfig, SourceStatus, SourceType};
use jobforge_core::store::TaskStore;
use jobforge_core::task::{ScrapedJobData, Task, TaskPayload, TaskStatus};
use jobforge_enrichment::{
    BudgetedSearch, CombinedReferenceLookup, HtmlFetchClient, HtmlFetchConfig, NoopSearchClient, WikidataClient,
    WikipediaClient,
};
use jobforge_worker::deps::{ConfiguredSearch, Deps};
use jobforge_worker::events::EventTap;
use jobforge_worker::processors::{job_listing, source, ProcessCtx, ProcessOutcome};
use jobforge_worker::store::memory::MemoryStore;
use openai_client::OpenAIClient;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Same fixture shape as the crate's internal unit-test config blobs
/// (`store::test_support`, not reachable from an external `tests/` binary),
/// kept minimal to the keys these scenarios actually exercise.
fn full_config_blobs() -> HashMap<String, serde_json::Value> {
    let mut blobs = HashMap::new();
    blobs.insert(
        jobforge_core::config::PREFILTER_POLICY_KEY.to_string(),
        json!({
            "excluded_job_types": ["internship"],
            "excluded_seniorities": ["intern"],
            "excluded_companies": [],
            "excluded_keywords": ["sales representative"],
            "excluded_domains": [],
            "excluded_work_arrangements": [],
            "min_salary_floor": 100000,
            "low_salary_threshold": 120000,
            "min_experience_years": 2,
            "ideal_seniorities": ["senior", "staff"],
            "required_technologies": []
        }),
    );
    blobs.insert(
        jobforge_core::config::MATCH_POLICY_KEY.to_string(),
        json!({
            "seniority": {
                "preferred": ["senior", "staff"], "acceptable": ["mid"], "rejected": ["intern"],
                "preferred_score": 20, "acceptable_score": 10
            },
            "allow_remote": true, "allow_hybrid": true,
            "user_timezone_offset": -5, "max_timezone_diff_hours": 4,
            "timezone_penalty_per_hour": 1,
            "skill_base_score": 5, "skill_years_multiplier": 1.0, "max_years_bonus": 10,
            "missing_required_penalty": -10, "analog_groups": {}, "analog_partial_credit": 2,
            "max_bonus": 50, "max_penalty": -50, "required_skills": ["rust"],
            "salary_weight": 1, "freshness_weight": 1, "role_fit_weight": 1,
            "company_bonus_weight": 1, "min_score": -5, "min_match_score": 0
        }),
    );
    blobs.insert(
        jobforge_core::config::WORKER_SETTINGS_KEY.to_string(),
        json!({
            "max_retries": 3,
            "max_spawn_depth": 10,
            "max_company_wait_retries": 5,
            "concurrency": 4
        }),
    );
    blobs.insert(
        jobforge_core::config::AI_SETTINGS_KEY.to_string(),
        json!({
            "company_extraction": {"provider": "anthropic", "interface": "api", "model": "claude-3-5-sonnet", "max_tokens_per_call": 4000, "max_cost_cents_per_call": 25},
            "job_extraction": {"provider": "anthropic", "interface": "api", "model": "claude-3-5-sonnet", "max_tokens_per_call": 4000, "max_cost_cents_per_call": 25},
            "match_analysis": {"provider": "anthropic", "interface": "api", "model": "claude-3-5-sonnet", "max_tokens_per_call": 4000, "max_cost_cents_per_call": 25}
        }),
    );
    blobs.insert(
        jobforge_core::config::PERSONAL_INFO_KEY.to_string(),
        json!({
            "name": "Test Candidate", "skills": ["rust", "distributed systems"], "skill_years": {"rust": 4.0},
            "target_seniority": "senior", "timezone_offset": -5,
            "desired_salary_min": 130000, "remote_only": true
        }),
    );
    blobs
}

fn test_deps(store: Arc<MemoryStore>) -> Deps {
    Deps {
        store,
        reference_lookup: CombinedReferenceLookup { primary: WikipediaClient::new(), secondary: WikidataClient::new() },
        search: BudgetedSearch::new(ConfiguredSearch::Noop(NoopSearchClient), 0),
        html_client: HtmlFetchClient::new(HtmlFetchConfig::default()).expect("html client"),
        ai: AgentManager::new(OpenAIClient::new("test-key")),
        http: reqwest::Client::new(),
        events: EventTap::new(16),
    }
}

fn greenhouse_source(url: String) -> JobSource {
    let mut fields = std::collections::HashMap::new();
    fields.insert("title".into(), "title".into());
    fields.insert("location".into(), "location.name".into());
    fields.insert("description".into(), "content".into());
    fields.insert("url".into(), "absolute_url".into());
    fields.insert("posted_date".into(), "updated_at".into());

    JobSource {
        id: Uuid::new_v4(),
        company_id: None,
        source_type: SourceType::Api,
        config: SourceConfig {
            source_type: SourceType::Api,
            url,
            response_path: Some("jobs".into()),
            job_selector: None,
            fields,
            headers: std::collections::HashMap::new(),
            company_name: Some("Stripe".into()),
            auth_type: None,
            auth_param: None,
            api_key: None,
            salary_min_field: None,
            salary_max_field: None,
        },
        status: SourceStatus::Active,
        discovery_confidence: jobforge_core::source::DiscoveryConfidence::High,
        consecutive_failures: 0,
        last_success_at: None,
        last_failure_at: None,
        validation_required: false,
    }
}

/// S1 — Greenhouse ingestion: 3 jobs returned, one titled "Sales
/// Representative" which the prefilter's excluded-keyword rule rejects
/// before it ever becomes a Pending job-listing task.
#[tokio::test]
async fn greenhouse_ingestion_rejects_excluded_keyword_job() {
    let mock_server = MockServer::start().await;
    // Posted "yesterday" relative to whenever the test actually runs, well
    // inside the default 7-day reject window, so this doesn't bit-rot into a
    // false hard-rejection on posting age as real time moves forward.
    let posted_at = (chrono::Utc::now() - chrono::Duration::days(1)).to_rfc3339();
    let body = json!({
        "jobs": [
            {
                "title": "Senior Rust Engineer",
                "location": {"name": "Remote"},
                "content": "Build our payments platform in Rust.",
                "absolute_url": format!("{}/jobs/1", mock_server.uri()),
                "updated_at": posted_at
            },
            {
                "title": "Staff Backend Engineer",
                "location": {"name": "Remote"},
                "content": "Own our distributed systems stack.",
                "absolute_url": format!("{}/jobs/2", mock_server.uri()),
                "updated_at": posted_at
            },
            {
                "title": "Sales Representative",
                "location": {"name": "New York"},
                "content": "Carry a quota, close deals.",
                "absolute_url": format!("{}/jobs/3", mock_server.uri()),
                "updated_at": posted_at
            }
        ]
    });
    Mock::given(method("GET"))
        .and(path("/v1/boards/stripe/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&mock_server)
        .await;

    let blobs = full_config_blobs();
    let store = Arc::new(MemoryStore::new(blobs.clone()));
    let config = ConfigSnapshot::from_blobs(&blobs).expect("valid fixture config");
    let deps = test_deps(store.clone());

    let source = greenhouse_source(format!("{}/v1/boards/stripe/jobs?content=true", mock_server.uri()));
    let source_id = source.id;
    store.insert_source(&source).await.expect("insert source");

    let now = chrono::Utc::now();
    let task = Task::new_root(Uuid::new_v4(), TaskPayload::ScrapeSource { source_id }, 3, now);
    let ctx = ProcessCtx { task: &task, config: &config, deps: &deps, worker_id: "test-worker" };

    let outcome = source::process(&ctx).await;
    assert!(matches!(outcome, ProcessOutcome::Success), "expected Success, got {outcome:?}");

    let listings = store.all_tasks_sync();
    let listing_tasks: Vec<_> = listings
        .iter()
        .filter(|t| matches!(t.payload, TaskPayload::JobListing { .. }))
        .collect();
    assert_eq!(listing_tasks.len(), 2, "only the two non-excluded jobs should become Pending listing tasks");
    assert!(listing_tasks.iter().all(|t| t.status == TaskStatus::Pending));

    let sales_job = store
        .sources_sync()
        .into_iter()
        .find(|s| s.id == source_id)
        .expect("source still present");
    assert_eq!(sales_job.consecutive_failures, 0, "a non-empty scrape resets the failure streak");
}

/// S5 — Source auto-disable: after `N_fail_disable` (5) consecutive scrape
/// failures the source transitions to `Disabled`, and a further
/// `ScrapeSource` task for it does no work.
#[tokio::test]
async fn source_auto_disables_after_five_consecutive_failures() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/boards/acme/jobs"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let blobs = full_config_blobs();
    let store = Arc::new(MemoryStore::new(blobs.clone()));
    let config = ConfigSnapshot::from_blobs(&blobs).expect("valid fixture config");
    let deps = test_deps(store.clone());

    let source = greenhouse_source(format!("{}/v1/boards/acme/jobs?content=true", mock_server.uri()));
    let source_id = source.id;
    store.insert_source(&source).await.expect("insert source");

    for attempt in 1..=5 {
        let task = Task::new_root(Uuid::new_v4(), TaskPayload::ScrapeSource { source_id }, 3, chrono::Utc::now());
        let ctx = ProcessCtx { task: &task, config: &config, deps: &deps, worker_id: "test-worker" };
        let outcome = source::process(&ctx).await;
        assert!(matches!(outcome, ProcessOutcome::Failed { .. }), "attempt {attempt} should fail");

        let current = store.sources_sync().into_iter().find(|s| s.id == source_id).unwrap();
        if attempt < 5 {
            assert_eq!(current.status, SourceStatus::Active, "still active after {attempt} failures");
        } else {
            assert_eq!(current.status, SourceStatus::Disabled, "disabled after 5th consecutive failure");
        }
    }

    // A scrape task against the now-disabled source should be rejected by
    // the dispatcher before reaching the processor in the real worker loop;
    // here we assert the store-level invariant the dispatcher relies on:
    // the source record itself carries the disabled status permanently
    // until an operator re-enables it.
    let final_state = store.sources_sync().into_iter().find(|s| s.id == source_id).unwrap();
    assert_eq!(final_state.consecutive_failures, 5);
    assert_eq!(final_state.status, SourceStatus::Disabled);
}

/// S4 — Loop prevention: a Company task's own source-discovery spawn can
/// never produce a second Company spawn back at the same URL within the
/// same lineage, because the ancestry check rejects it.
#[tokio::test]
async fn loop_prevention_rejects_company_spawn_matching_ancestor_url() {
    let blobs = full_config_blobs();
    let store = Arc::new(MemoryStore::new(blobs.clone()));

    let root = Task::new_root(
        Uuid::new_v4(),
        TaskPayload::Company { url: Some("https://foo.com/careers".into()), company_name: "Foo".into() },
        3,
        chrono::Utc::now(),
    );
    store.seed_task(root.clone());
    store.seed_company(Company::new("Foo"));

    // Root "completes" the discovery step by spawning a SourceDiscovery
    // child at the same URL it was given.
    let discovery_spawn = store
        .try_spawn(root.id, TaskPayload::SourceDiscovery { url: "https://foo.com/careers".into(), hints: Some("Foo".into()) }, 3)
        .await
        .expect("store call succeeds")
        .expect("first spawn is not deduplicated");

    // That child now tries to spawn a Company task back at the very same
    // URL — this must be rejected because the URL is already in its own
    // ancestry chain.
    let child = store.get_task(discovery_spawn).await.expect("child task exists");
    let second_attempt = store
        .try_spawn(child.id, TaskPayload::Company { url: Some("https://foo.com/careers".into()), company_name: "Foo".into() }, 3)
        .await
        .expect("store call succeeds");
    assert!(second_attempt.is_err(), "spawning a Company task back at an ancestor's url must be rejected");

    let tasks = store.all_tasks_sync();
    let company_tasks = tasks.iter().filter(|t| matches!(t.payload, TaskPayload::Company { .. })).count();
    assert_eq!(company_tasks, 1, "only the original root Company task should exist in this lineage");
}

/// S3 — Company wait requeue, legacy `scraped_data` submission: a manual
/// job-listing task (no `listing_id`, carrying `scraped_data`) materializes
/// a `JobListing` row, then requeues itself while its company has no good
/// data yet. The requeued task must carry that listing's id rather than the
/// original `scraped_data` payload, so re-leasing it resolves by id instead
/// of re-entering the legacy branch and deduping against the row this same
/// lineage already inserted (spec §4.9 step 3, §9 back-compat).
#[tokio::test]
async fn company_wait_requeue_rewrites_legacy_payload_to_listing_id() {
    let blobs = full_config_blobs();
    let store = Arc::new(MemoryStore::new(blobs.clone()));
    let config = ConfigSnapshot::from_blobs(&blobs).expect("valid fixture config");
    let deps = test_deps(store.clone());

    let scraped_data = ScrapedJobData {
        title: "Senior Rust Engineer".into(),
        company: Some("NewCo".into()),
        location: Some("Remote".into()),
        description: "Build our core platform in Rust, own the on-call rotation.".into(),
        url: "https://newco.example.com/jobs/1".into(),
        posted_date: None,
        salary: Some("150000-180000".into()),
    };
    let first_task = Task::new_root(
        Uuid::new_v4(),
        TaskPayload::JobListing { listing_id: None, scraped_data: Some(scraped_data) },
        3,
        chrono::Utc::now(),
    );
    let first_id = first_task.id;
    store.seed_task(first_task.clone());

    let ctx = ProcessCtx { task: &first_task, config: &config, deps: &deps, worker_id: "test-worker" };
    let outcome = job_listing::process(&ctx).await;
    assert!(
        matches!(outcome, ProcessOutcome::AlreadyTerminal),
        "first pass should materialize the listing then requeue while NewCo has no good data, got {outcome:?}"
    );

    let first_after = store.get_task(first_id).await.expect("original task still exists");
    assert_eq!(first_after.status, TaskStatus::Success, "requeue_self completes the original attempt as Success");

    let tasks = store.all_tasks_sync();
    let listing_tasks: Vec<_> = tasks.iter().filter(|t| matches!(t.payload, TaskPayload::JobListing { .. })).collect();
    assert_eq!(listing_tasks.len(), 2, "the original task plus exactly one requeued successor");
    let requeued = listing_tasks
        .into_iter()
        .find(|t| t.id != first_id)
        .expect("requeued successor exists");
    let TaskPayload::JobListing { listing_id, scraped_data } = &requeued.payload else {
        unreachable!("filtered on JobListing payload above");
    };
    assert!(listing_id.is_some(), "requeued task must carry the materialized listing's id");
    assert!(scraped_data.is_none(), "requeued task must not carry the legacy scraped_data forward");

    let listing = store.get_listing(listing_id.unwrap()).await.expect("materialized listing is readable by id");
    assert_eq!(listing.title, "Senior Rust Engineer");
}
