//! The `JobListing` record (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Pending,
    Analyzing,
    Analyzed,
    Skipped,
    Matched,
}

/// Structured facts pulled out by the `job_extraction` AI task kind (spec §4.5, §4.9 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub seniority: Option<String>,
    pub technologies: Vec<String>,
    pub work_arrangement: Option<String>,
    pub posted_date: Option<DateTime<Utc>>,
    pub updated_date: Option<DateTime<Utc>>,
}

/// Deterministic score breakdown persisted alongside the listing (spec §4.3, §4.9 step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringResult {
    pub final_score: i64,
    pub skill_match: i64,
    pub seniority_match: i64,
    pub location_score: i64,
    pub company_score: i64,
    pub freshness_score: i64,
    pub passed: bool,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListing {
    pub id: Uuid,
    pub source_id: Uuid,
    pub company_id: Option<Uuid>,
    /// Normalized; unique per source (spec §3 invariant, §8 property 3).
    pub url: String,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub posted_date: Option<DateTime<Utc>>,
    pub salary_range: Option<String>,
    pub status: ListingStatus,
    pub extraction_result: Option<ExtractionResult>,
    pub scoring_result: Option<ScoringResult>,
    pub match_score: Option<i64>,
    pub created_at: DateTime<Utc>,
}
