//! The `JobMatch` record: a listing that survived deterministic scoring and
//! AI match analysis (spec §3, §4.9 step 7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMatch {
    pub job_listing_id: Uuid,
    pub company_id: Option<Uuid>,
    pub match_score: i64,
    pub reasoning: String,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}
