//! Shared config fixtures for unit and integration tests across this crate,
//! grounded on `jobforge_core::config`'s own test fixtures but kept here so
//! processor and store tests don't duplicate the JSON.

use std::collections::HashMap;

use jobforge_core::config::{
    AI_SETTINGS_KEY, MATCH_POLICY_KEY, PERSONAL_INFO_KEY, PREFILTER_POLICY_KEY, WORKER_SETTINGS_KEY,
};
use serde_json::{json, Value};

pub fn full_config_blobs() -> HashMap<String, Value> {
    let mut blobs = HashMap::new();
    blobs.insert(
        PREFILTER_POLICY_KEY.to_string(),
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
        MATCH_POLICY_KEY.to_string(),
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
        WORKER_SETTINGS_KEY.to_string(),
        json!({
            "max_retries": 3,
            "max_spawn_depth": 10,
            "max_company_wait_retries": 5,
            "concurrency": 4
        }),
    );
    blobs.insert(
        AI_SETTINGS_KEY.to_string(),
        json!({
            "company_extraction": {"provider": "anthropic", "interface": "api", "model": "claude-3-5-sonnet", "max_tokens_per_call": 4000, "max_cost_cents_per_call": 25},
            "job_extraction": {"provider": "anthropic", "interface": "api", "model": "claude-3-5-sonnet", "max_tokens_per_call": 4000, "max_cost_cents_per_call": 25},
            "match_analysis": {"provider": "anthropic", "interface": "api", "model": "claude-3-5-sonnet", "max_tokens_per_call": 4000, "max_cost_cents_per_call": 25}
        }),
    );
    blobs.insert(
        PERSONAL_INFO_KEY.to_string(),
        json!({
            "name": "Test Candidate", "skills": ["rust", "distributed systems"], "skill_years": {"rust": 4.0},
            "target_seniority": "senior", "timezone_offset": -5,
            "desired_salary_min": 130000, "remote_only": true
        }),
    );
    blobs
}
