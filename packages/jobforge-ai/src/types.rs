//! Strict JSON response shapes for the three served task kinds (spec §4.5).
//! Each carries a `reasoning` field so the manager can persist it for audit
//! without ever replaying it back into a later prompt.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentTaskKind {
    CompanyExtraction,
    JobExtraction,
    MatchAnalysis,
}

impl AgentTaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentTaskKind::CompanyExtraction => "company_extraction",
            AgentTaskKind::JobExtraction => "job_extraction",
            AgentTaskKind::MatchAnalysis => "match_analysis",
        }
    }
}

/// Turns Wikipedia/Wikidata/search/scraped-page context into a Company
/// record (spec §4.5 task kind "company_extraction").
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompanyExtraction {
    pub about: Option<String>,
    pub culture: Option<String>,
    pub mission: Option<String>,
    pub industry: Option<String>,
    pub founded: Option<String>,
    pub headquarters_location: Option<String>,
    pub employee_count: Option<String>,
    pub company_size_category: Option<String>,
    pub is_remote_first: Option<bool>,
    pub ai_ml_focus: Option<bool>,
    pub timezone_offset: Option<i32>,
    pub products: Vec<String>,
    pub tech_stack: Vec<String>,
    pub reasoning: String,
}

/// Extracts structured facts from a raw job description (spec §4.5 task
/// kind "job_extraction").
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobExtraction {
    pub seniority: Option<String>,
    pub technologies: Vec<String>,
    pub work_arrangement: Option<String>,
    pub posted_date: Option<String>,
    pub updated_date: Option<String>,
    pub reasoning: String,
}

/// Given a candidate-passing scored job, produces reasoning and a
/// matched/missing skill breakdown and priority (spec §4.5 task kind
/// "match_analysis"). `match_score` is the model's own verdict, checked
/// against `min_match_score`, independent of `deterministic_score` supplied
/// as context (spec §4.9 step 6).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MatchAnalysis {
    pub match_score: i64,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub priority: String,
    pub reasoning: String,
}
