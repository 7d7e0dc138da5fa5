//! Filter Engine (spec §4.2): a stateless evaluator combining hard prefilter
//! rejections and a strike-based soft filter.
//!
//! Grounded on `listing_evaluator.rs`'s `pre_filter`: hard rejections are
//! checked first, in policy-list order, and the first match wins
//! deterministically before any strike accounting happens.

use chrono::{DateTime, Utc};
use jobforge_core::config::PrefilterPolicy;
use tracing::debug;

/// The subset of a job listing the Filter Engine needs. Kept independent of
/// `jobforge_core::JobListing` so the engine stays pure and trivially
/// testable without constructing a full store-owned record.
#[derive(Debug, Clone)]
pub struct FilterableJob<'a> {
    pub title: &'a str,
    pub url: &'a str,
    pub company_name: Option<&'a str>,
    pub description: &'a str,
    pub job_type: Option<&'a str>,
    pub seniority: Option<&'a str>,
    pub work_arrangement: Option<&'a str>,
    pub salary_min: Option<i64>,
    pub experience_years_required: Option<u32>,
    pub required_technologies_present: &'a [String],
    pub posted_date: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardRejectionKind {
    JobType,
    Seniority,
    Company,
    Keyword,
    Domain,
    PostingAge,
    WorkArrangement,
    Salary,
}

#[derive(Debug, Clone)]
pub struct Verdict {
    pub passed: bool,
    pub hard_rejection: Option<HardRejectionKind>,
    pub strikes: u32,
    pub reasons: Vec<String>,
}

/// Evaluate one job against a prefilter policy. Pure: identical inputs always
/// produce an identical verdict (spec §8 property 4).
pub fn evaluate_job(job: &FilterableJob, policy: &PrefilterPolicy) -> Verdict {
    if let Some(kind) = first_hard_rejection(job, policy) {
        let reason = format!("hard_rejection:{kind:?}");
        debug!(reason = %reason, url = %job.url, "job hard-rejected by prefilter");
        return Verdict {
            passed: false,
            hard_rejection: Some(kind),
            strikes: 0,
            reasons: vec![reason],
        };
    }

    let (strikes, reasons) = accumulate_strikes(job, policy);
    let passed = strikes < policy.strike_threshold;
    Verdict {
        passed,
        hard_rejection: None,
        strikes,
        reasons,
    }
}

/// Hard rejections are evaluated in policy-list order; the first match wins
/// (spec §4.2 "Ordering").
fn first_hard_rejection(job: &FilterableJob, policy: &PrefilterPolicy) -> Option<HardRejectionKind> {
    if let Some(job_type) = job.job_type {
        if policy
            .excluded_job_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(job_type))
        {
            return Some(HardRejectionKind::JobType);
        }
    }

    if let Some(seniority) = job.seniority {
        if policy
            .excluded_seniorities
            .iter()
            .any(|s| s.eq_ignore_ascii_case(seniority))
        {
            return Some(HardRejectionKind::Seniority);
        }
    }

    if let Some(company) = job.company_name {
        let normalized = jobforge_core::normalize::normalize_company_name(company);
        if policy
            .excluded_companies
            .iter()
            .any(|c| jobforge_core::normalize::normalize_company_name(c) == normalized)
        {
            return Some(HardRejectionKind::Company);
        }
    }

    let haystack = format!("{} {}", job.title, job.url).to_lowercase();
    if policy
        .excluded_keywords
        .iter()
        .any(|kw| haystack.contains(&kw.to_lowercase()))
    {
        return Some(HardRejectionKind::Keyword);
    }

    if policy
        .excluded_domains
        .iter()
        .any(|domain| job.url.to_lowercase().contains(&domain.to_lowercase()))
    {
        return Some(HardRejectionKind::Domain);
    }

    if let Some(posted) = job.posted_date {
        let age_days = (job.now - posted).num_days();
        if age_days > policy.reject_days as i64 {
            return Some(HardRejectionKind::PostingAge);
        }
    }

    if let Some(arrangement) = job.work_arrangement {
        if policy
            .excluded_work_arrangements
            .iter()
            .any(|a| a.eq_ignore_ascii_case(arrangement))
        {
            return Some(HardRejectionKind::WorkArrangement);
        }
    }

    if let (Some(floor), Some(min_salary)) = (policy.min_salary_floor, job.salary_min) {
        if min_salary < floor {
            return Some(HardRejectionKind::Salary);
        }
    }

    None
}

/// Integer strikes for soft issues (spec §4.2 "Strike accumulation").
fn accumulate_strikes(job: &FilterableJob, policy: &PrefilterPolicy) -> (u32, Vec<String>) {
    let mut strikes = 0u32;
    let mut reasons = Vec::new();

    let low_salary = match (policy.low_salary_threshold, job.salary_min) {
        (Some(threshold), Some(salary)) => salary < threshold,
        (Some(_), None) => true,
        (None, _) => false,
    };
    if low_salary {
        strikes += 1;
        reasons.push("strike:low_salary".to_string());
    }

    if let (Some(min_years), Some(years)) = (policy.min_experience_years, job.experience_years_required) {
        if years < min_years {
            strikes += 1;
            reasons.push("strike:low_experience".to_string());
        }
    }

    if let Some(seniority) = job.seniority {
        if !policy.ideal_seniorities.is_empty()
            && !policy
                .ideal_seniorities
                .iter()
                .any(|s| s.eq_ignore_ascii_case(seniority))
        {
            strikes += 1;
            reasons.push("strike:non_ideal_seniority".to_string());
        }
    }

    let missing_required = policy
        .required_technologies
        .iter()
        .any(|tech| !job.required_technologies_present.iter().any(|t| t.eq_ignore_ascii_case(tech)));
    if missing_required && !policy.required_technologies.is_empty() {
        strikes += 1;
        reasons.push("strike:missing_required_technology".to_string());
    }

    if job.description.len() < policy.min_description_length as usize {
        strikes += 1;
        reasons.push("strike:short_description".to_string());
    }

    if let Some(posted) = job.posted_date {
        if (job.now - posted).num_days() >= 1 {
            strikes += 1;
            reasons.push("strike:stale_posting".to_string());
        }
    }

    (strikes, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base_policy() -> PrefilterPolicy {
        PrefilterPolicy {
            excluded_job_types: vec!["internship".into()],
            excluded_seniorities: vec!["intern".into()],
            excluded_companies: vec!["BadCo".into()],
            excluded_keywords: vec!["unpaid".into()],
            excluded_domains: vec!["spamjobs.com".into()],
            reject_days: 7,
            excluded_work_arrangements: vec!["onsite-only".into()],
            min_salary_floor: Some(100_000),
            strike_threshold: 5,
            low_salary_threshold: Some(120_000),
            min_experience_years: Some(3),
            ideal_seniorities: vec!["senior".into()],
            required_technologies: vec!["rust".into()],
            min_description_length: 50,
        }
    }

    fn base_job<'a>(now: DateTime<Utc>) -> FilterableJob<'a> {
        FilterableJob {
            title: "Senior Rust Engineer",
            url: "https://example.com/jobs/1",
            company_name: Some("GoodCo"),
            description: &"a".repeat(200),
            job_type: Some("full-time"),
            seniority: Some("senior"),
            work_arrangement: Some("remote"),
            salary_min: Some(150_000),
            experience_years_required: Some(5),
            required_technologies_present: &[],
            posted_date: Some(now),
            now,
        }
    }

    #[test]
    fn passing_job_with_no_issues() {
        let now = Utc::now();
        let mut job = base_job(now);
        let techs = vec!["rust".to_string()];
        job.required_technologies_present = &techs;
        let verdict = evaluate_job(&job, &base_policy());
        assert!(verdict.passed);
        assert!(verdict.hard_rejection.is_none());
    }

    #[test]
    fn salary_below_floor_is_hard_rejected_s6() {
        let now = Utc::now();
        let mut job = base_job(now);
        job.salary_min = Some(80_000);
        let verdict = evaluate_job(&job, &base_policy());
        assert!(!verdict.passed);
        assert_eq!(verdict.hard_rejection, Some(HardRejectionKind::Salary));
    }

    #[test]
    fn excluded_keyword_in_title_rejects_before_strikes() {
        let now = Utc::now();
        let mut job = base_job(now);
        job.title = "Unpaid Internship Opportunity";
        let verdict = evaluate_job(&job, &base_policy());
        assert_eq!(verdict.hard_rejection, Some(HardRejectionKind::Keyword));
    }

    #[test]
    fn sales_title_keyword_rejection_s1() {
        let now = Utc::now();
        let mut policy = base_policy();
        policy.excluded_keywords = vec!["sales representative".into()];
        let mut job = base_job(now);
        job.title = "Sales Representative";
        let verdict = evaluate_job(&job, &policy);
        assert!(!verdict.passed);
        assert_eq!(verdict.hard_rejection, Some(HardRejectionKind::Keyword));
    }

    #[test]
    fn posting_older_than_reject_days_is_hard_rejected() {
        let now = Utc::now();
        let mut job = base_job(now);
        job.posted_date = Some(now - Duration::days(10));
        let verdict = evaluate_job(&job, &base_policy());
        assert_eq!(verdict.hard_rejection, Some(HardRejectionKind::PostingAge));
    }

    #[test]
    fn strikes_accumulate_to_filtered_without_hard_rejection() {
        let now = Utc::now();
        let mut policy = base_policy();
        policy.strike_threshold = 2;
        let mut job = base_job(now);
        job.salary_min = Some(50_000); // missing required tech + low salary + short desc below
        job.description = "short";
        let verdict = evaluate_job(&job, &policy);
        assert!(!verdict.passed);
        assert!(verdict.hard_rejection.is_none());
        assert!(verdict.strikes >= 2);
    }

    #[test]
    fn evaluate_job_is_pure() {
        let now = Utc::now();
        let job = base_job(now);
        let policy = base_policy();
        let a = evaluate_job(&job, &policy);
        let b = evaluate_job(&job, &policy);
        assert_eq!(a.passed, b.passed);
        assert_eq!(a.strikes, b.strikes);
        assert_eq!(a.hard_rejection, b.hard_rejection);
    }
}
