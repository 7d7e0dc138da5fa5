//! The five named config blobs (spec §6) and the Config Loader contract
//! (spec §2, §5, §10.3): read-only to processors, hot-reloadable, fails fast
//! on missing required keys.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// The five config blob keys, exactly as persisted in the `config` table.
pub const PREFILTER_POLICY_KEY: &str = "prefilter-policy";
pub const MATCH_POLICY_KEY: &str = "match-policy";
pub const WORKER_SETTINGS_KEY: &str = "worker-settings";
pub const AI_SETTINGS_KEY: &str = "ai-settings";
pub const PERSONAL_INFO_KEY: &str = "personal-info";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefilterPolicy {
    pub excluded_job_types: Vec<String>,
    pub excluded_seniorities: Vec<String>,
    pub excluded_companies: Vec<String>,
    pub excluded_keywords: Vec<String>,
    pub excluded_domains: Vec<String>,
    #[serde(default = "default_reject_days")]
    pub reject_days: u32,
    pub excluded_work_arrangements: Vec<String>,
    pub min_salary_floor: Option<i64>,
    #[serde(default = "default_strike_threshold")]
    pub strike_threshold: u32,
    pub low_salary_threshold: Option<i64>,
    pub min_experience_years: Option<u32>,
    pub ideal_seniorities: Vec<String>,
    pub required_technologies: Vec<String>,
    #[serde(default = "default_min_description_length")]
    pub min_description_length: u32,
}

fn default_reject_days() -> u32 {
    7
}
fn default_strike_threshold() -> u32 {
    5
}
fn default_min_description_length() -> u32 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeniorityBucket {
    pub preferred: Vec<String>,
    pub acceptable: Vec<String>,
    pub rejected: Vec<String>,
    pub preferred_score: i64,
    pub acceptable_score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPolicy {
    pub seniority: SeniorityBucket,
    pub allow_remote: bool,
    pub allow_hybrid: bool,
    pub user_timezone_offset: i32,
    pub max_timezone_diff_hours: i32,
    pub timezone_penalty_per_hour: i64,
    pub skill_base_score: i64,
    pub skill_years_multiplier: f64,
    pub max_years_bonus: i64,
    pub missing_required_penalty: i64,
    pub analog_groups: HashMap<String, Vec<String>>,
    pub analog_partial_credit: i64,
    pub max_bonus: i64,
    pub max_penalty: i64,
    pub required_skills: Vec<String>,
    pub salary_weight: i64,
    pub freshness_weight: i64,
    pub role_fit_weight: i64,
    pub company_bonus_weight: i64,
    pub min_score: i64,
    pub min_match_score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    #[serde(default = "default_processing_timeout")]
    pub processing_timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_base_ms")]
    pub retry_backoff_base_ms: u64,
    #[serde(default = "default_retry_backoff_cap_ms")]
    pub retry_backoff_cap_ms: u64,
    #[serde(default = "default_max_spawn_depth")]
    pub max_spawn_depth: u32,
    #[serde(default = "default_max_company_wait_retries")]
    pub max_company_wait_retries: u32,
    #[serde(default = "default_company_wait_backoff_seconds")]
    pub company_wait_backoff_seconds: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_daily_search_cap")]
    pub daily_search_cap: u32,
}

fn default_processing_timeout() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_base_ms() -> u64 {
    1000
}
fn default_retry_backoff_cap_ms() -> u64 {
    5 * 60 * 1000
}
fn default_max_spawn_depth() -> u32 {
    10
}
fn default_max_company_wait_retries() -> u32 {
    5
}
fn default_company_wait_backoff_seconds() -> u64 {
    30
}
fn default_concurrency() -> usize {
    4
}
fn default_poll_interval_ms() -> u64 {
    2000
}
fn default_daily_search_cap() -> u32 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    pub provider: String,
    pub interface: String,
    pub model: String,
    pub max_tokens_per_call: u64,
    pub max_cost_cents_per_call: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    pub company_extraction: AgentSettings,
    pub job_extraction: AgentSettings,
    pub match_analysis: AgentSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub name: String,
    pub skills: Vec<String>,
    pub skill_years: HashMap<String, f64>,
    pub target_seniority: String,
    pub timezone_offset: i32,
    pub desired_salary_min: Option<i64>,
    pub remote_only: bool,
}

/// A loaded, validated snapshot of all five blobs. Readers observe one
/// consistent snapshot per call (spec §5 shared-resource policy); the Config
/// Loader is the only writer and publishes via wholesale replacement.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub prefilter_policy: PrefilterPolicy,
    pub match_policy: MatchPolicy,
    pub worker_settings: WorkerSettings,
    pub ai_settings: AiSettings,
    pub personal_info: PersonalInfo,
}

impl ConfigSnapshot {
    /// Parse and validate all five blobs from their raw JSON form, keyed by
    /// the constants above. Fails fast (spec §6, §7 `MissingConfig`) the
    /// moment any required blob is absent or fails to parse; optional inner
    /// keys are defaulted via serde, never silently defaulted when the
    /// field itself is required (e.g. `PrefilterPolicy::excluded_job_types`
    /// has no `#[serde(default)]` and so is rejected if absent).
    pub fn from_blobs(blobs: &HashMap<String, serde_json::Value>) -> Result<Self, StoreError> {
        let prefilter_policy = parse_required(blobs, PREFILTER_POLICY_KEY)?;
        let match_policy = parse_required(blobs, MATCH_POLICY_KEY)?;
        let worker_settings = parse_required(blobs, WORKER_SETTINGS_KEY)?;
        let ai_settings = parse_required(blobs, AI_SETTINGS_KEY)?;
        let personal_info = parse_required(blobs, PERSONAL_INFO_KEY)?;
        Ok(Self {
            prefilter_policy,
            match_policy,
            worker_settings,
            ai_settings,
            personal_info,
        })
    }
}

fn parse_required<T: serde::de::DeserializeOwned>(
    blobs: &HashMap<String, serde_json::Value>,
    key: &str,
) -> Result<T, StoreError> {
    let value = blobs
        .get(key)
        .ok_or_else(|| StoreError::MissingConfig(key.to_string()))?;
    serde_json::from_value(value.clone())
        .map_err(|e| StoreError::MissingConfig(format!("{key}: {e}")))
}
