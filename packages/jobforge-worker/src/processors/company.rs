//! Company Processor (spec §4.7): given a company name and optional seed
//! URL, gathers reference facts, a candidate website sample, and an AI
//! extraction pass, merges everything into one `Company` record, and spawns
//! source discovery off the resolved website when one wasn't already tried.

use jobforge_core::company::{AnalysisStatus, Company, CompanySizeCategory};
use jobforge_core::normalize::{canonical_name_for_hint_url, normalize_company_name};
use jobforge_core::task::TaskPayload;
use jobforge_enrichment::SearchOutcome;
use jobforge_ai::{AgentTaskKind, CompanyExtraction};
use tracing::{info, instrument, warn};

use super::merge::{fill_empty, keep_longer, pick_best_website};
use super::{ProcessCtx, ProcessOutcome};

const COMPANY_EXTRACTION_SYSTEM_PROMPT: &str = "You are extracting structured facts about a company from the \
supplied reference notes and, if present, a sample of its own website. Only state what the material actually \
supports; leave a field null rather than guessing.";

/// Runs the nine steps of spec §4.7 against the claimed `Company` task.
#[instrument(skip(ctx), fields(task_id = %ctx.task.id))]
pub async fn process(ctx: &ProcessCtx<'_>) -> ProcessOutcome {
    let TaskPayload::Company { url: seed_url, company_name } = &ctx.task.payload else {
        return ProcessOutcome::failed_invalid_state("company processor received a non-company payload");
    };

    // Step 1: resolve a canonical name. A seed URL pointing at a known job
    // board ATS (e.g. an mdlz.wd1.myworkdayjobs.com careers page) maps to the
    // real company name rather than trusting the payload's raw name.
    let canonical_name = match seed_url {
        Some(url) => canonical_name_for_hint_url(url, company_name),
        None => company_name.clone(),
    };
    let normalized_name = normalize_company_name(&canonical_name);

    // Step 2: load or create the record, transition Pending/Active -> Analyzing.
    let mut company = match ctx.deps.store.get_company_by_name(&normalized_name).await {
        Ok(Some(existing)) => existing,
        Ok(None) | Err(_) => Company::new(canonical_name.clone()),
    };
    if !company.analysis_status.can_transition_to(AnalysisStatus::Analyzing) {
        warn!(company = %normalized_name, from = ?company.analysis_status, "illegal company transition, forcing Analyzing anyway");
    }
    company.analysis_status = AnalysisStatus::Analyzing;

    // Step 3: reference lookup (Wikipedia + Wikidata), never fatal.
    let reference = ctx
        .deps
        .reference_lookup
        .lookup(&canonical_name)
        .await
        .unwrap_or_default();

    // Step 4: web search for the company's own site when we have no seed URL
    // and the reference lookup didn't surface a website either.
    let mut search_hits = Vec::new();
    if seed_url.is_none() && reference.website.is_none() {
        let daily_count = ctx.deps.store.increment_daily_search_count().await;
        if let Ok(count_today) = daily_count {
            match ctx
                .deps
                .search
                .search(&format!("{canonical_name} official site"), 5, count_today)
                .await
            {
                Ok(SearchOutcome::Results(results)) => search_hits = results,
                Ok(SearchOutcome::Skipped { reason }) => {
                    info!(company = %normalized_name, reason, "web search skipped");
                }
                Err(err) => warn!(company = %normalized_name, error = %err, "web search failed"),
            }
        }
    }

    let candidate_website = seed_url
        .clone()
        .or_else(|| reference.website.clone())
        .or_else(|| search_hits.first().map(|r| r.url.clone()));

    // Step 5: sample the candidate website only when the reference lookup
    // didn't already give us enough text to work with (spec §4.7 step 5,
    // using the same `about` length threshold as `Company::has_good_data`).
    const ABOUT_SAMPLE_THRESHOLD: usize = 100;
    let about_is_thin = reference.about.as_deref().map(str::len).unwrap_or(0) < ABOUT_SAMPLE_THRESHOLD;
    let html_sample = match (&candidate_website, about_is_thin) {
        (Some(url), true) => match ctx.deps.html_client.fetch(url).await {
            Ok(sample) => jobforge_enrichment::html::to_markdown(&sample.body).ok(),
            Err(err) => {
                warn!(company = %normalized_name, error = %err, "website sample fetch failed");
                None
            }
        },
        _ => None,
    };

    // Step 6: AI extraction from everything gathered so far.
    let user_prompt = build_extraction_prompt(&canonical_name, &reference, &search_hits, html_sample.as_deref());
    let extraction = ctx
        .deps
        .ai
        .run::<CompanyExtraction>(
            AgentTaskKind::CompanyExtraction,
            COMPANY_EXTRACTION_SYSTEM_PROMPT,
            &user_prompt,
            &ctx.config.ai_settings,
        )
        .await;

    let extraction = match extraction {
        Ok(outcome) => {
            let _ = ctx
                .deps
                .store
                .record_ai_usage(ctx.task.id, outcome.tokens_used, outcome.cost_cents)
                .await;
            Some(outcome.result)
        }
        Err(err) => {
            warn!(company = %normalized_name, error = %err, "company extraction failed, continuing with partial data");
            None
        }
    };

    // Step 7: merge everything into the company record (idempotent, spec §8).
    merge_into_company(&mut company, &reference, candidate_website.as_deref(), extraction.as_ref());

    // Step 8: Analyzing -> Active (Failed only when nothing at all could be
    // learned, matching "continues with partial data" from spec §7).
    company.analysis_status = if company.has_minimal_data() || company.website.is_some() {
        AnalysisStatus::Active
    } else {
        AnalysisStatus::Failed
    };
    company.updated_at = chrono::Utc::now();

    if let Err(err) = ctx.deps.store.upsert_company(&company).await {
        return ProcessOutcome::failed(err);
    }

    ctx.deps.events.emit(
        ctx.task.id,
        ctx.task.tracking_id,
        crate::events::EventKind::JobCompanyLookup,
        Some(normalized_name.clone()),
    );

    // Step 9: one source-discovery spawn off the resolved website, if we have
    // one and haven't already tried it somewhere in this lineage.
    if let Some(website) = company.website.clone() {
        let spawn_result = ctx
            .deps
            .store
            .try_spawn(
                ctx.task.id,
                TaskPayload::SourceDiscovery {
                    url: website,
                    hints: Some(normalized_name.clone()),
                },
                ctx.config.worker_settings.max_retries,
            )
            .await;
        match spawn_result {
            Ok(Ok(_child_id)) => {}
            Ok(Err(rejection)) => {
                info!(company = %normalized_name, ?rejection, "source discovery spawn skipped");
            }
            Err(err) => warn!(company = %normalized_name, error = %err, "source discovery spawn attempt failed"),
        }
    }

    match company.analysis_status {
        AnalysisStatus::Failed => ProcessOutcome::Failed {
            details: format!("no usable data found for company {normalized_name}"),
            category: jobforge_core::error::ErrorCategory::PermanentSource,
        },
        _ => ProcessOutcome::Success,
    }
}

fn build_extraction_prompt(
    canonical_name: &str,
    reference: &jobforge_enrichment::ReferenceFacts,
    search_hits: &[jobforge_enrichment::SearchResult],
    html_sample: Option<&str>,
) -> String {
    let mut sections = vec![format!("Company name: {canonical_name}")];
    if let Some(about) = &reference.about {
        sections.push(format!("Reference summary ({}):\n{about}", reference.source));
    }
    if let Some(hq) = &reference.headquarters_location {
        sections.push(format!("Reference headquarters: {hq}"));
    }
    if let Some(industry) = &reference.industry {
        sections.push(format!("Reference industry: {industry}"));
    }
    if !search_hits.is_empty() {
        let hits = search_hits
            .iter()
            .map(|hit| format!("- {} ({}): {}", hit.title, hit.url, hit.snippet))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("Search results:\n{hits}"));
    }
    if let Some(sample) = html_sample {
        sections.push(format!("Website sample:\n{sample}"));
    }
    sections.join("\n\n")
}

/// Folds reference facts, the resolved candidate website, and the AI
/// extraction result into `company`. Pure aside from the `&mut Company`
/// target, and idempotent: rerunning with the same inputs never changes
/// the outcome (spec §8).
fn merge_into_company(
    company: &mut Company,
    reference: &jobforge_enrichment::ReferenceFacts,
    candidate_website: Option<&str>,
    extraction: Option<&CompanyExtraction>,
) {
    company.website = pick_best_website(
        company.website.as_deref(),
        &[candidate_website, reference.website.as_deref()],
    );

    let extraction_about = extraction.and_then(|e| e.about.as_deref());
    company.about = keep_longer(company.about.as_deref(), &[reference.about.as_deref(), extraction_about]);

    let extraction_culture = extraction.and_then(|e| e.culture.as_deref());
    company.culture = keep_longer(company.culture.as_deref(), &[extraction_culture]);

    let extraction_mission = extraction.and_then(|e| e.mission.as_deref());
    company.mission = keep_longer(company.mission.as_deref(), &[extraction_mission]);

    let extraction_industry = extraction.and_then(|e| e.industry.as_deref());
    company.industry = fill_empty(
        company.industry.clone(),
        vec![reference.industry.clone(), extraction_industry.map(str::to_string)],
    );

    let extraction_founded = extraction.and_then(|e| e.founded.as_deref());
    company.founded = fill_empty(
        company.founded.clone(),
        vec![reference.founded.clone(), extraction_founded.map(str::to_string)],
    );

    let extraction_hq = extraction.and_then(|e| e.headquarters_location.as_deref());
    company.headquarters_location = fill_empty(
        company.headquarters_location.clone(),
        vec![reference.headquarters_location.clone(), extraction_hq.map(str::to_string)],
    );

    let employee_count_candidate = extraction
        .and_then(|e| e.employee_count.as_deref())
        .and_then(parse_employee_count)
        .or_else(|| reference.employee_count.as_deref().and_then(parse_employee_count));
    company.employee_count = fill_empty(company.employee_count, vec![employee_count_candidate]);

    if company.company_size_category.is_none() {
        company.company_size_category = extraction
            .and_then(|e| e.company_size_category.as_deref())
            .and_then(parse_size_category)
            .or_else(|| company.employee_count.map(size_category_from_headcount));
    }

    if let Some(e) = extraction {
        company.is_remote_first = Some(company.is_remote_first.unwrap_or(false) || e.is_remote_first.unwrap_or(false));
        company.ai_ml_focus = Some(company.ai_ml_focus.unwrap_or(false) || e.ai_ml_focus.unwrap_or(false));
        company.timezone_offset = fill_empty(company.timezone_offset, vec![e.timezone_offset]);

        for product in &e.products {
            if !company.products.contains(product) {
                company.products.push(product.clone());
            }
        }
        for tech in &e.tech_stack {
            if !company.tech_stack.contains(tech) {
                company.tech_stack.push(tech.clone());
            }
        }
    }
}

/// Pulls the first run of digits out of a free-text employee-count string
/// (e.g. "approximately 1,200 employees" -> 1200). Returns `None` when no
/// digits are present rather than guessing.
fn parse_employee_count(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn parse_size_category(raw: &str) -> Option<CompanySizeCategory> {
    match raw.to_lowercase().as_str() {
        "small" => Some(CompanySizeCategory::Small),
        "medium" => Some(CompanySizeCategory::Medium),
        "large" => Some(CompanySizeCategory::Large),
        _ => None,
    }
}

fn size_category_from_headcount(count: u64) -> CompanySizeCategory {
    if count < 50 {
        CompanySizeCategory::Small
    } else if count < 1000 {
        CompanySizeCategory::Medium
    } else {
        CompanySizeCategory::Large
    }
}

impl ProcessOutcome {
    fn failed_invalid_state(details: &str) -> Self {
        ProcessOutcome::Failed {
            details: details.to_string(),
            category: jobforge_core::error::ErrorCategory::InvalidState,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobforge_enrichment::ReferenceFacts;

    #[test]
    fn merge_prefers_longer_about_from_extraction() {
        let mut company = Company::new("Acme".into());
        let extraction = CompanyExtraction {
            about: Some("Acme builds widgets for the enterprise market at global scale.".into()),
            culture: None,
            mission: None,
            industry: None,
            founded: None,
            headquarters_location: None,
            employee_count: Some("about 1,200".into()),
            company_size_category: None,
            is_remote_first: Some(true),
            ai_ml_focus: None,
            timezone_offset: None,
            products: vec!["Widget Pro".into()],
            tech_stack: vec!["Rust".into()],
            reasoning: "test".into(),
        };
        merge_into_company(&mut company, &ReferenceFacts::default(), None, Some(&extraction));
        assert_eq!(company.about, extraction.about.clone());
        assert_eq!(company.employee_count, Some(1200));
        assert_eq!(company.is_remote_first, Some(true));
        assert_eq!(company.products, vec!["Widget Pro".to_string()]);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut company = Company::new("Acme".into());
        let extraction = CompanyExtraction {
            about: Some("Acme builds widgets.".into()),
            culture: None,
            mission: None,
            industry: Some("Manufacturing".into()),
            founded: None,
            headquarters_location: None,
            employee_count: None,
            company_size_category: None,
            is_remote_first: None,
            ai_ml_focus: None,
            timezone_offset: None,
            products: vec![],
            tech_stack: vec![],
            reasoning: "test".into(),
        };
        merge_into_company(&mut company, &ReferenceFacts::default(), None, Some(&extraction));
        let snapshot = company.clone();
        merge_into_company(&mut company, &ReferenceFacts::default(), None, Some(&extraction));
        assert_eq!(company.industry, snapshot.industry);
        assert_eq!(company.about, snapshot.about);
    }

    #[test]
    fn pick_best_website_prefers_first_party_candidate_over_job_board_seed() {
        let mut company = Company::new("Acme".into());
        merge_into_company(
            &mut company,
            &ReferenceFacts::default(),
            Some("https://www.linkedin.com/company/acme"),
            None,
        );
        assert_eq!(company.website.as_deref(), Some("https://www.linkedin.com/company/acme"));
        merge_into_company(&mut company, &ReferenceFacts::default(), Some("https://acme.com"), None);
        assert_eq!(company.website.as_deref(), Some("https://acme.com"));
    }
}
