//! Scoring Engine (spec §4.3): a deterministic, signed-integer score of a job
//! against company, personal-info, and policy data.
//!
//! Grounded on the same pattern as `jobforge-filter` (a pure function over a
//! borrowed view, no I/O) and on `listing_evaluator.rs`'s confidence-bucket
//! style of turning qualitative signals into numeric scores.

use jobforge_core::config::MatchPolicy;
use tracing::debug;

/// The subset of a job listing + company + personal-info the Scoring Engine
/// needs. Kept independent of the store-owned records so the engine stays
/// pure and trivially testable (spec §8 property 5, "Scoring idempotence").
#[derive(Debug, Clone)]
pub struct ScorableJob<'a> {
    pub seniority: Option<&'a str>,
    pub work_arrangement: Option<&'a str>,
    pub technologies: &'a [String],
    pub salary_min: Option<i64>,
    pub posted_age_days: Option<i64>,
    pub company_timezone_offset: Option<i32>,
    pub company_is_remote_first: Option<bool>,
    pub company_ai_ml_focus: Option<bool>,
    pub company_has_good_data: bool,
    pub role_fit_hint: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    pub final_score: i64,
    pub skill_match: i64,
    pub seniority_match: i64,
    pub location_score: i64,
    pub company_score: i64,
    pub freshness_score: i64,
    pub passed: bool,
    pub rejection_reason: Option<String>,
}

/// Score a job against `policy`. Pure: identical inputs always produce an
/// identical `ScoreBreakdown` (spec §8 property 5).
pub fn score(job: &ScorableJob, personal_skills: &[String], policy: &MatchPolicy) -> ScoreBreakdown {
    let seniority_match = match seniority_score(job.seniority, policy) {
        SeniorityOutcome::Rejected => {
            debug!(seniority = ?job.seniority, "seniority rejected by policy");
            return ScoreBreakdown {
                final_score: 0,
                skill_match: 0,
                seniority_match: 0,
                location_score: 0,
                company_score: 0,
                freshness_score: 0,
                passed: false,
                rejection_reason: Some("seniority".to_string()),
            };
        }
        SeniorityOutcome::Score(s) => s,
    };

    let location_score = location_score(job, policy);
    if let LocationOutcome::Dealbreaker = location_score {
        debug!(arrangement = ?job.work_arrangement, "work arrangement disallowed by policy");
        return ScoreBreakdown {
            final_score: 0,
            skill_match: 0,
            seniority_match,
            location_score: 0,
            company_score: 0,
            freshness_score: 0,
            passed: false,
            rejection_reason: Some("work_arrangement".to_string()),
        };
    }
    let location_score = location_score.unwrap_score();

    let skill_match = skill_match_score(job, personal_skills, policy);
    let salary_score = salary_score(job, policy);
    let freshness_score = freshness_score(job, policy);
    let role_fit = role_fit_score(job, policy);
    let company_score = company_bonus_score(job, policy) + salary_score;

    let final_score = seniority_match + location_score + skill_match + company_score + freshness_score + role_fit;

    let passed = final_score >= policy.min_score;

    ScoreBreakdown {
        final_score,
        skill_match,
        seniority_match,
        location_score,
        company_score,
        freshness_score,
        passed,
        rejection_reason: if passed { None } else { Some("below_min_score".to_string()) },
    }
}

enum SeniorityOutcome {
    Rejected,
    Score(i64),
}

fn seniority_score(seniority: Option<&str>, policy: &MatchPolicy) -> SeniorityOutcome {
    let Some(seniority) = seniority else {
        return SeniorityOutcome::Score(0);
    };
    let bucket = &policy.seniority;
    if bucket.rejected.iter().any(|s| s.eq_ignore_ascii_case(seniority)) {
        return SeniorityOutcome::Rejected;
    }
    if bucket.preferred.iter().any(|s| s.eq_ignore_ascii_case(seniority)) {
        return SeniorityOutcome::Score(bucket.preferred_score);
    }
    if bucket.acceptable.iter().any(|s| s.eq_ignore_ascii_case(seniority)) {
        return SeniorityOutcome::Score(bucket.acceptable_score);
    }
    SeniorityOutcome::Score(0)
}

enum LocationOutcome {
    Dealbreaker,
    Score(i64),
}

impl LocationOutcome {
    fn unwrap_score(self) -> i64 {
        match self {
            LocationOutcome::Score(s) => s,
            LocationOutcome::Dealbreaker => unreachable!("dealbreaker handled by caller before unwrap"),
        }
    }
}

/// Depends on remote/hybrid allowance, timezone diff, and per-hour penalty.
/// Returns [`LocationOutcome::Dealbreaker`] when the arrangement is
/// disallowed outright by policy, rather than folding it into the numeric
/// score where it could be masked by other contributions.
fn location_score(job: &ScorableJob, policy: &MatchPolicy) -> LocationOutcome {
    match job.work_arrangement.map(str::to_lowercase).as_deref() {
        Some("remote") => {
            if !policy.allow_remote {
                return LocationOutcome::Dealbreaker;
            }
        }
        Some("hybrid") => {
            if !policy.allow_hybrid {
                return LocationOutcome::Dealbreaker;
            }
        }
        _ => {}
    }

    let Some(company_offset) = job.company_timezone_offset else {
        return LocationOutcome::Score(0);
    };
    let diff = (company_offset - policy.user_timezone_offset).unsigned_abs() as i64;
    if diff <= policy.max_timezone_diff_hours as i64 {
        return LocationOutcome::Score(0);
    }
    let over = diff - policy.max_timezone_diff_hours as i64;
    LocationOutcome::Score(-(over * policy.timezone_penalty_per_hour))
}

/// Per-skill base + years multiplier (capped), missing-required penalty,
/// analog-group partial credit; bounded by `max_bonus`/`max_penalty`.
fn skill_match_score(job: &ScorableJob, personal_skills: &[String], policy: &MatchPolicy) -> i64 {
    let mut total = 0i64;

    for skill in personal_skills {
        let direct_match = job.technologies.iter().any(|t| t.eq_ignore_ascii_case(skill));
        if direct_match {
            let years_bonus = policy.skill_years_multiplier.max(0.0) as i64;
            total += policy.skill_base_score + years_bonus.min(policy.max_years_bonus);
            continue;
        }
        if let Some(group) = policy
            .analog_groups
            .values()
            .find(|members| members.iter().any(|m| m.eq_ignore_ascii_case(skill)))
        {
            let analog_present = group
                .iter()
                .any(|m| job.technologies.iter().any(|t| t.eq_ignore_ascii_case(m)));
            if analog_present {
                total += policy.analog_partial_credit;
            }
        }
    }

    for required in &policy.required_skills {
        let present = job.technologies.iter().any(|t| t.eq_ignore_ascii_case(required));
        if !present {
            total += policy.missing_required_penalty;
        }
    }

    total.clamp(policy.max_penalty, policy.max_bonus)
}

fn salary_score(job: &ScorableJob, policy: &MatchPolicy) -> i64 {
    match job.salary_min {
        Some(_) => policy.salary_weight,
        None => 0,
    }
}

fn freshness_score(job: &ScorableJob, policy: &MatchPolicy) -> i64 {
    match job.posted_age_days {
        Some(age) if age <= 1 => policy.freshness_weight,
        Some(age) if age <= 7 => policy.freshness_weight / 2,
        _ => 0,
    }
}

fn role_fit_score(job: &ScorableJob, policy: &MatchPolicy) -> i64 {
    if job.role_fit_hint.is_some() {
        policy.role_fit_weight
    } else {
        0
    }
}

fn company_bonus_score(job: &ScorableJob, policy: &MatchPolicy) -> i64 {
    let mut bonus = 0i64;
    if job.company_has_good_data {
        bonus += policy.company_bonus_weight;
    }
    if job.company_is_remote_first == Some(true) {
        bonus += policy.company_bonus_weight;
    }
    if job.company_ai_ml_focus == Some(true) {
        bonus += policy.company_bonus_weight;
    }
    bonus
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobforge_core::config::SeniorityBucket;
    use std::collections::HashMap;

    fn base_policy() -> MatchPolicy {
        MatchPolicy {
            seniority: SeniorityBucket {
                preferred: vec!["senior".into()],
                acceptable: vec!["mid".into()],
                rejected: vec!["intern".into()],
                preferred_score: 20,
                acceptable_score: 10,
            },
            allow_remote: true,
            allow_hybrid: true,
            user_timezone_offset: -5,
            max_timezone_diff_hours: 3,
            timezone_penalty_per_hour: 2,
            skill_base_score: 5,
            skill_years_multiplier: 1.0,
            max_years_bonus: 10,
            missing_required_penalty: -15,
            analog_groups: HashMap::new(),
            analog_partial_credit: 3,
            max_bonus: 50,
            max_penalty: -50,
            required_skills: vec!["rust".into()],
            salary_weight: 2,
            freshness_weight: 4,
            role_fit_weight: 3,
            company_bonus_weight: 2,
            min_score: 10,
            min_match_score: 5,
        }
    }

    fn base_job<'a>() -> ScorableJob<'a> {
        ScorableJob {
            seniority: Some("senior"),
            work_arrangement: Some("remote"),
            technologies: &[],
            salary_min: Some(150_000),
            posted_age_days: Some(0),
            company_timezone_offset: Some(-5),
            company_is_remote_first: Some(true),
            company_ai_ml_focus: Some(false),
            company_has_good_data: true,
            role_fit_hint: Some("engineer"),
        }
    }

    #[test]
    fn rejected_seniority_short_circuits_with_reason() {
        let mut job = base_job();
        job.seniority = Some("intern");
        let techs = vec!["rust".to_string()];
        job.technologies = &techs;
        let breakdown = score(&job, &["rust".to_string()], &base_policy());
        assert!(!breakdown.passed);
        assert_eq!(breakdown.rejection_reason.as_deref(), Some("seniority"));
        assert_eq!(breakdown.final_score, 0);
    }

    #[test]
    fn disallowed_remote_is_a_dealbreaker() {
        let mut policy = base_policy();
        policy.allow_remote = false;
        let techs = vec!["rust".to_string()];
        let mut job = base_job();
        job.technologies = &techs;
        let breakdown = score(&job, &["rust".to_string()], &policy);
        assert!(!breakdown.passed);
    }

    #[test]
    fn timezone_diff_beyond_max_is_penalized() {
        let mut job = base_job();
        job.company_timezone_offset = Some(3); // 8 hours from -5
        let techs = vec!["rust".to_string()];
        job.technologies = &techs;
        let breakdown = score(&job, &["rust".to_string()], &base_policy());
        assert!(breakdown.location_score < 0);
    }

    #[test]
    fn missing_required_skill_is_penalized() {
        let mut job = base_job();
        let techs: Vec<String> = vec![];
        job.technologies = &techs;
        let breakdown = score(&job, &["rust".to_string()], &base_policy());
        assert!(breakdown.skill_match < 0);
    }

    #[test]
    fn passing_job_meets_min_score() {
        let techs = vec!["rust".to_string()];
        let mut job = base_job();
        job.technologies = &techs;
        let breakdown = score(&job, &["rust".to_string()], &base_policy());
        assert!(breakdown.passed, "{breakdown:?}");
    }

    #[test]
    fn score_is_idempotent() {
        let techs = vec!["rust".to_string()];
        let mut job = base_job();
        job.technologies = &techs;
        let policy = base_policy();
        let skills = vec!["rust".to_string()];
        let a = score(&job, &skills, &policy);
        let b = score(&job, &skills, &policy);
        assert_eq!(a.final_score, b.final_score);
        assert_eq!(a.passed, b.passed);
    }
}
