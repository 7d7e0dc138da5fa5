//! Job Listing Processor (spec §4.9): the multi-stage pipeline combining
//! company coordination, AI extraction, deterministic scoring, and AI match
//! analysis. One queue item runs every stage in order up to the first
//! terminal outcome; only the company-wait stage requeues.

use chrono::Utc;
use jobforge_core::company::Company;
use jobforge_core::job_match::{JobMatch, Priority};
use jobforge_core::listing::{ExtractionResult, JobListing, ListingStatus, ScoringResult};
use jobforge_core::normalize::{normalize_company_name, normalize_url};
use jobforge_core::task::{ScrapedJobData, TaskPayload};
use jobforge_ai::{AgentTaskKind, JobExtraction, MatchAnalysis};
use jobforge_filter::FilterableJob;
use jobforge_scoring::ScorableJob;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{ProcessCtx, ProcessOutcome};
use crate::backoff::not_before;
use crate::events::EventKind;

const JOB_EXTRACTION_SYSTEM_PROMPT: &str = "You are extracting structured facts from a raw job posting. Only \
state what the posting text actually supports; leave a field null rather than guessing.";

const MATCH_ANALYSIS_SYSTEM_PROMPT: &str = "You are judging whether a job posting is a good match for the \
candidate described below, given a deterministic prefilter score that already passed. Produce your own \
match_score independent of that deterministic score, list matched and missing skills, and pick a priority.";

#[instrument(skip(ctx), fields(task_id = %ctx.task.id))]
pub async fn process(ctx: &ProcessCtx<'_>) -> ProcessOutcome {
    let TaskPayload::JobListing { listing_id, scraped_data } = &ctx.task.payload else {
        return ProcessOutcome::Failed {
            details: "job listing processor received a non-job-listing payload".into(),
            category: jobforge_core::error::ErrorCategory::InvalidState,
        };
    };

    // Stage 1: scrape / materialize.
    let (mut listing, company_name) = match materialize(ctx, listing_id.as_ref(), scraped_data.as_ref()).await {
        Ok(Outcome::Ready(listing, name)) => (listing, name),
        Ok(Outcome::Terminal(outcome)) => return outcome,
        Err(err) => return ProcessOutcome::failed(err),
    };
    ctx.deps.events.emit(ctx.task.id, ctx.task.tracking_id, EventKind::JobScraped, Some(listing.url.clone()));

    // Stage 2: company lookup.
    let company = match company_lookup(ctx, company_name.as_deref()).await {
        Ok(company) => company,
        Err(err) => return ProcessOutcome::failed(err),
    };
    ctx.deps.events.emit(
        ctx.task.id,
        ctx.task.tracking_id,
        EventKind::JobCompanyLookup,
        company_name.clone(),
    );

    // Stage 3: wait-company (conditional requeue, never deadlocks).
    if let Some(name) = &company_name {
        let wants_wait = company.as_ref().map(|c| !c.has_good_data()).unwrap_or(true);
        let retries = ctx.task.pipeline_state.company_wait_retries;
        let max_retries = ctx.config.worker_settings.max_company_wait_retries;
        if wants_wait && retries < max_retries {
            return wait_for_company(ctx, name, retries, listing.id).await;
        }
    }

    // Stage 4: AI job extraction.
    let extraction = match run_job_extraction(ctx, &listing).await {
        Ok(extraction) => extraction,
        Err(err) => return ProcessOutcome::failed(err),
    };
    ctx.deps.events.emit(ctx.task.id, ctx.task.tracking_id, EventKind::JobExtraction, None);

    listing.extraction_result = Some(ExtractionResult {
        seniority: extraction.seniority.clone(),
        technologies: extraction.technologies.clone(),
        work_arrangement: extraction.work_arrangement.clone(),
        posted_date: extraction.posted_date.as_deref().and_then(parse_flexible_date),
        updated_date: extraction.updated_date.as_deref().and_then(parse_flexible_date),
    });

    // Stage 5: deterministic scoring.
    let personal_skills = &ctx.config.personal_info.skills;
    let breakdown = score_listing(&listing, &extraction, company.as_ref(), ctx, personal_skills);
    listing.scoring_result = Some(ScoringResult {
        final_score: breakdown.final_score,
        skill_match: breakdown.skill_match,
        seniority_match: breakdown.seniority_match,
        location_score: breakdown.location_score,
        company_score: breakdown.company_score,
        freshness_score: breakdown.freshness_score,
        passed: breakdown.passed,
        rejection_reason: breakdown.rejection_reason.clone(),
    });
    listing.status = ListingStatus::Analyzed;
    ctx.deps.events.emit(ctx.task.id, ctx.task.tracking_id, EventKind::JobScoring, Some(breakdown.final_score.to_string()));

    if !breakdown.passed {
        if let Err(err) = ctx.deps.store.update_listing(&listing).await {
            return ProcessOutcome::failed(err);
        }
        let reason = breakdown.rejection_reason.unwrap_or_else(|| "scoring".to_string());
        return ProcessOutcome::Skipped(reason);
    }

    // Stage 6: AI match analysis.
    let analysis = match run_match_analysis(ctx, &listing, &breakdown).await {
        Ok(analysis) => analysis,
        Err(err) => {
            if let Err(store_err) = ctx.deps.store.update_listing(&listing).await {
                return ProcessOutcome::failed(store_err);
            }
            return ProcessOutcome::failed(err);
        }
    };
    ctx.deps.events.emit(ctx.task.id, ctx.task.tracking_id, EventKind::JobAnalysis, Some(analysis.match_score.to_string()));

    if analysis.match_score < ctx.config.match_policy.min_match_score {
        listing.status = ListingStatus::Skipped;
        if let Err(err) = ctx.deps.store.update_listing(&listing).await {
            return ProcessOutcome::failed(err);
        }
        return ProcessOutcome::Skipped("below_min_match_score".to_string());
    }

    // Stage 7: save match.
    listing.match_score = Some(analysis.match_score);
    listing.status = ListingStatus::Matched;
    if let Err(err) = ctx.deps.store.update_listing(&listing).await {
        return ProcessOutcome::failed(err);
    }

    let job_match = JobMatch {
        job_listing_id: listing.id,
        company_id: listing.company_id,
        match_score: analysis.match_score,
        reasoning: analysis.reasoning.clone(),
        matched_skills: analysis.matched_skills.clone(),
        missing_skills: analysis.missing_skills.clone(),
        priority: parse_priority(&analysis.priority),
        created_at: Utc::now(),
    };
    if let Err(err) = ctx.deps.store.insert_match(&job_match).await {
        return ProcessOutcome::failed(err);
    }
    ctx.deps.events.emit(ctx.task.id, ctx.task.tracking_id, EventKind::JobSaved, Some(listing.id.to_string()));

    ProcessOutcome::Success
}

enum Outcome {
    Ready(JobListing, Option<String>),
    Terminal(ProcessOutcome),
}

/// Materializes the listing's raw data from an existing row, or converts a
/// legacy `scraped_data` payload into one (spec §9 "Back-compat with legacy
/// `scraped_data` payloads"). Returns the resolved company name alongside
/// the listing, since `JobListing` itself carries no name field.
async fn materialize(
    ctx: &ProcessCtx<'_>,
    listing_id: Option<&Uuid>,
    scraped_data: Option<&ScrapedJobData>,
) -> jobforge_core::store::Result<Outcome> {
    if let Some(id) = listing_id {
        let listing = ctx.deps.store.get_listing(*id).await?;
        let company_name = match ctx.deps.store.get_source(listing.source_id).await {
            Ok(source) => source.config.company_name,
            Err(_) => None,
        };
        return Ok(Outcome::Ready(listing, company_name));
    }

    let Some(data) = scraped_data else {
        return Ok(Outcome::Terminal(ProcessOutcome::Failed {
            details: "job listing task carries neither a listing_id nor scraped_data".into(),
            category: jobforge_core::error::ErrorCategory::InvalidState,
        }));
    };

    let normalized_url = normalize_url(&data.url);
    if ctx.deps.store.find_listing_by_normalized_url(&normalized_url).await?.is_some() {
        return Ok(Outcome::Terminal(ProcessOutcome::Skipped("duplicate normalized url".to_string())));
    }

    let filterable = FilterableJob {
        title: &data.title,
        url: &normalized_url,
        company_name: data.company.as_deref(),
        description: &data.description,
        job_type: None,
        seniority: None,
        work_arrangement: None,
        salary_min: parse_salary_min(data.salary.as_deref()),
        experience_years_required: None,
        required_technologies_present: &[],
        posted_date: data.posted_date.as_deref().and_then(parse_flexible_date),
        now: Utc::now(),
    };
    let verdict = jobforge_filter::evaluate_job(&filterable, &ctx.config.prefilter_policy);
    if verdict.hard_rejection.is_some() {
        return Ok(Outcome::Terminal(ProcessOutcome::Filtered(format!("{:?}", verdict.hard_rejection))));
    }

    let listing = JobListing {
        id: Uuid::new_v4(),
        // Legacy submissions carry no source; `Uuid::nil()` marks "manual
        // intake" rather than inventing a fake registered source.
        source_id: Uuid::nil(),
        company_id: None,
        url: normalized_url,
        title: data.title.clone(),
        description: data.description.clone(),
        location: data.location.clone(),
        posted_date: filterable.posted_date,
        salary_range: data.salary.clone(),
        status: ListingStatus::Pending,
        extraction_result: None,
        scoring_result: None,
        match_score: None,
        created_at: Utc::now(),
    };
    ctx.deps.store.insert_listing(&listing).await?;
    Ok(Outcome::Ready(listing, data.company.clone()))
}

/// Finds the company by normalized name, creating a `Pending` stub
/// immediately if absent (spec §4.9 step 2: "no blocking dependency").
async fn company_lookup(ctx: &ProcessCtx<'_>, company_name: Option<&str>) -> jobforge_core::store::Result<Option<Company>> {
    let Some(name) = company_name else { return Ok(None) };
    let normalized = normalize_company_name(name);
    match ctx.deps.store.get_company_by_name(&normalized).await? {
        Some(company) => Ok(Some(company)),
        None => {
            let stub = Company::new(name);
            ctx.deps.store.upsert_company(&stub).await?;
            Ok(Some(stub))
        }
    }
}

/// Spawns a Company task for `company_name` if none exists in this lineage
/// yet and spawn safety allows it, then requeues the current task with an
/// incremented wait counter (spec §4.9 step 3). The requeued task's payload
/// is rewritten to point at `listing_id` rather than carrying the original
/// payload forward unchanged: a legacy `scraped_data` submission has already
/// been materialized into a `JobListing` row by the time this stage runs, so
/// re-leasing the original payload would re-enter the legacy branch and
/// dedupe against the row this same lineage just inserted (spec §9
/// back-compat). The original attempt completes Success-by-requeue via
/// `TaskStore::requeue_self`, so the dispatcher must not touch this task's
/// status again.
async fn wait_for_company(ctx: &ProcessCtx<'_>, company_name: &str, retries: u32, listing_id: Uuid) -> ProcessOutcome {
    ctx.deps.events.emit(ctx.task.id, ctx.task.tracking_id, EventKind::JobWaitingCompany, Some(company_name.to_string()));

    let normalized = normalize_company_name(company_name);
    let already_waiting = ctx
        .deps
        .store
        .find_company_task_in_lineage(ctx.task.tracking_id, &normalized)
        .await
        .unwrap_or(None)
        .is_some();

    if !already_waiting {
        let spawn_result = ctx
            .deps
            .store
            .try_spawn(
                ctx.task.id,
                TaskPayload::Company { url: None, company_name: company_name.to_string() },
                ctx.config.worker_settings.max_retries,
            )
            .await;
        match spawn_result {
            Ok(Ok(_)) => {}
            Ok(Err(rejection)) => info!(?rejection, company = %normalized, "company spawn skipped while waiting"),
            Err(err) => warn!(error = %err, company = %normalized, "company spawn attempt failed"),
        }
    }

    let backoff_ms = ctx.config.worker_settings.company_wait_backoff_seconds * 1000;
    let not_before_ts = not_before(Utc::now(), 1, backoff_ms, backoff_ms);
    let payload_override = TaskPayload::JobListing { listing_id: Some(listing_id), scraped_data: None };
    match ctx
        .deps
        .store
        .requeue_self(ctx.task.id, retries + 1, not_before_ts, Some(payload_override))
        .await
    {
        Ok(_new_id) => ProcessOutcome::AlreadyTerminal,
        Err(err) => ProcessOutcome::failed(err),
    }
}

async fn run_job_extraction(ctx: &ProcessCtx<'_>, listing: &JobListing) -> jobforge_ai::Result<JobExtraction> {
    let prompt = format!(
        "Title: {}\nLocation: {}\nSalary range: {}\nDescription:\n{}",
        listing.title,
        listing.location.as_deref().unwrap_or("unknown"),
        listing.salary_range.as_deref().unwrap_or("unspecified"),
        listing.description,
    );
    let outcome = ctx
        .deps
        .ai
        .run::<JobExtraction>(AgentTaskKind::JobExtraction, JOB_EXTRACTION_SYSTEM_PROMPT, &prompt, &ctx.config.ai_settings)
        .await?;
    let _ = ctx.deps.store.record_ai_usage(ctx.task.id, outcome.tokens_used, outcome.cost_cents).await;
    Ok(outcome.result)
}

async fn run_match_analysis(
    ctx: &ProcessCtx<'_>,
    listing: &JobListing,
    breakdown: &jobforge_scoring::ScoreBreakdown,
) -> jobforge_ai::Result<MatchAnalysis> {
    let prompt = format!(
        "Candidate: {} (target seniority {}, skills: {})\nDeterministic score breakdown: final={} skill={} seniority={} \
         location={} company={} freshness={}\nJob title: {}\nJob technologies extracted: see prior stage\nJob description:\n{}",
        ctx.config.personal_info.name,
        ctx.config.personal_info.target_seniority,
        ctx.config.personal_info.skills.join(", "),
        breakdown.final_score,
        breakdown.skill_match,
        breakdown.seniority_match,
        breakdown.location_score,
        breakdown.company_score,
        breakdown.freshness_score,
        listing.title,
        listing.description,
    );
    let outcome = ctx
        .deps
        .ai
        .run::<MatchAnalysis>(AgentTaskKind::MatchAnalysis, MATCH_ANALYSIS_SYSTEM_PROMPT, &prompt, &ctx.config.ai_settings)
        .await?;
    let _ = ctx.deps.store.record_ai_usage(ctx.task.id, outcome.tokens_used, outcome.cost_cents).await;
    Ok(outcome.result)
}

fn score_listing(
    listing: &JobListing,
    extraction: &JobExtraction,
    company: Option<&Company>,
    ctx: &ProcessCtx<'_>,
    personal_skills: &[String],
) -> jobforge_scoring::ScoreBreakdown {
    let posted_age_days = extraction
        .posted_date
        .as_deref()
        .and_then(parse_flexible_date)
        .or(listing.posted_date)
        .map(|dt| (Utc::now() - dt).num_days());

    let scorable = ScorableJob {
        seniority: extraction.seniority.as_deref(),
        work_arrangement: extraction.work_arrangement.as_deref(),
        technologies: &extraction.technologies,
        salary_min: parse_salary_min(listing.salary_range.as_deref()),
        posted_age_days,
        company_timezone_offset: company.and_then(|c| c.timezone_offset),
        company_is_remote_first: company.and_then(|c| c.is_remote_first),
        company_ai_ml_focus: company.and_then(|c| c.ai_ml_focus),
        company_has_good_data: company.map(|c| c.has_good_data()).unwrap_or(false),
        role_fit_hint: Some(listing.title.as_str()),
    };
    jobforge_scoring::score(&scorable, personal_skills, &ctx.config.match_policy)
}

fn parse_priority(raw: &str) -> Priority {
    match raw.to_lowercase().as_str() {
        "high" => Priority::High,
        "low" => Priority::Low,
        _ => Priority::Medium,
    }
}

/// Parses either an RFC3339 timestamp or a bare `YYYY-MM-DD` date, since
/// `job_extraction` may return either depending on what the posting stated.
fn parse_flexible_date(raw: &str) -> Option<chrono::DateTime<Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| chrono::DateTime::from_naive_utc_and_offset(dt, Utc))
}

/// Pulls a leading integer out of a formatted salary range string like
/// `"120000-150000"` or `"120000+"` (the shape `format_salary_range` in the
/// source processor produces).
fn parse_salary_min(raw: Option<&str>) -> Option<i64> {
    let raw = raw?;
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_salary_min_handles_range_and_plus() {
        assert_eq!(parse_salary_min(Some("120000-150000")), Some(120000));
        assert_eq!(parse_salary_min(Some("120000+")), Some(120000));
        assert_eq!(parse_salary_min(Some("up to 150000")), None);
        assert_eq!(parse_salary_min(None), None);
    }

    #[test]
    fn parse_priority_defaults_to_medium() {
        assert_eq!(parse_priority("High"), Priority::High);
        assert_eq!(parse_priority("weird"), Priority::Medium);
    }

    #[test]
    fn parse_flexible_date_accepts_bare_date() {
        assert!(parse_flexible_date("2026-01-15").is_some());
        assert!(parse_flexible_date("2026-01-15T00:00:00Z").is_some());
        assert!(parse_flexible_date("not a date").is_none());
    }
}
