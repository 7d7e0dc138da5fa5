//! The `Company` record (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Analyzing,
    Active,
    Failed,
}

impl AnalysisStatus {
    /// `{Pending->Analyzing, Analyzing->Active|Failed, Active->Analyzing
    /// (re-analysis), Failed->Pending (manual retry)}`; any other transition
    /// is rejected.
    pub fn can_transition_to(self, to: AnalysisStatus) -> bool {
        use AnalysisStatus::*;
        matches!(
            (self, to),
            (Pending, Analyzing) | (Analyzing, Active) | (Analyzing, Failed) | (Active, Analyzing) | (Failed, Pending)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanySizeCategory {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    pub website: Option<String>,
    pub about: Option<String>,
    pub culture: Option<String>,
    pub mission: Option<String>,
    pub industry: Option<String>,
    pub founded: Option<String>,
    pub headquarters_location: Option<String>,
    pub employee_count: Option<u64>,
    pub company_size_category: Option<CompanySizeCategory>,
    pub is_remote_first: Option<bool>,
    pub ai_ml_focus: Option<bool>,
    pub timezone_offset: Option<i32>,
    pub products: Vec<String>,
    pub tech_stack: Vec<String>,
    #[serde(default = "default_analysis_status")]
    pub analysis_status: AnalysisStatus,
    #[serde(default = "chrono::Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_analysis_status() -> AnalysisStatus {
    AnalysisStatus::Pending
}

impl Company {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            analysis_status: AnalysisStatus::Pending,
            updated_at: Utc::now(),
            ..Default::default()
        }
    }

    /// `len(about)>100 AND len(culture)>50`.
    pub fn has_good_data(&self) -> bool {
        self.about.as_deref().map(str::len).unwrap_or(0) > 100
            && self.culture.as_deref().map(str::len).unwrap_or(0) > 50
    }

    /// `len(about)>50 OR len(culture)>25`.
    pub fn has_minimal_data(&self) -> bool {
        self.about.as_deref().map(str::len).unwrap_or(0) > 50
            || self.culture.as_deref().map(str::len).unwrap_or(0) > 25
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_machine_rejects_skip() {
        assert!(AnalysisStatus::Pending.can_transition_to(AnalysisStatus::Analyzing));
        assert!(!AnalysisStatus::Pending.can_transition_to(AnalysisStatus::Active));
        assert!(AnalysisStatus::Active.can_transition_to(AnalysisStatus::Analyzing));
        assert!(!AnalysisStatus::Failed.can_transition_to(AnalysisStatus::Active));
    }

    #[test]
    fn good_data_predicate() {
        let mut c = Company::new("Acme");
        assert!(!c.has_good_data());
        c.about = Some("a".repeat(101));
        c.culture = Some("b".repeat(51));
        assert!(c.has_good_data());
    }

    #[test]
    fn minimal_data_predicate_is_or() {
        let mut c = Company::new("Acme");
        c.about = Some("a".repeat(51));
        assert!(c.has_minimal_data());
        let mut c2 = Company::new("Acme");
        c2.culture = Some("b".repeat(26));
        assert!(c2.has_minimal_data());
    }
}
