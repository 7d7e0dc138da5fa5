//! The `JobSource` record and its declarative `config` schema (spec §3, §6).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Api,
    Rss,
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    PendingValidation,
    Active,
    Disabled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryConfidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Header,
    Query,
    Bearer,
}

/// Declarative record that drives the Generic Scraper (spec §6 table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub url: String,
    pub response_path: Option<String>,
    pub job_selector: Option<String>,
    pub fields: HashMap<String, String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub company_name: Option<String>,
    pub auth_type: Option<AuthType>,
    pub auth_param: Option<String>,
    pub api_key: Option<String>,
    pub salary_min_field: Option<String>,
    pub salary_max_field: Option<String>,
}

impl SourceConfig {
    /// Validated-create pattern (supplement #3): a malformed source config
    /// fails fast at registration rather than producing a silent
    /// `MissingConfig`/`PermanentSource` error at scrape time.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.url.trim().is_empty() {
            return Err(StoreError::MissingConfig("source_config.url".into()));
        }
        if self.fields.is_empty() {
            return Err(StoreError::MissingConfig("source_config.fields".into()));
        }
        if self.source_type == SourceType::Html && self.job_selector.is_none() {
            return Err(StoreError::MissingConfig(
                "source_config.job_selector (required for html sources)".into(),
            ));
        }
        match self.auth_type {
            Some(AuthType::Header) | Some(AuthType::Query) => {
                if self.auth_param.is_none() {
                    return Err(StoreError::MissingConfig("source_config.auth_param".into()));
                }
                if self.api_key.is_none() {
                    return Err(StoreError::MissingConfig("source_config.api_key".into()));
                }
            }
            Some(AuthType::Bearer) => {
                if self.api_key.is_none() {
                    return Err(StoreError::MissingConfig("source_config.api_key".into()));
                }
            }
            None => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSource {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub source_type: SourceType,
    pub config: SourceConfig,
    pub status: SourceStatus,
    pub discovery_confidence: DiscoveryConfidence,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub validation_required: bool,
}

/// Default consecutive-failure threshold after which a source auto-disables
/// (spec §3 invariant, §4.8, §8 property 6).
pub const N_FAIL_DISABLE: u32 = 5;

impl JobSource {
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.consecutive_failures += 1;
        self.last_failure_at = Some(now);
        if self.consecutive_failures >= N_FAIL_DISABLE {
            self.status = SourceStatus::Disabled;
        }
    }

    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.consecutive_failures = 0;
        self.last_success_at = Some(now);
    }

    /// Whether the dispatcher may lease a `ScrapeSource` task for this source.
    pub fn is_scrapeable(&self) -> bool {
        matches!(self.status, SourceStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> SourceConfig {
        let mut fields = HashMap::new();
        fields.insert("title".into(), "title".into());
        SourceConfig {
            source_type: SourceType::Api,
            url: "https://example.com/jobs".into(),
            response_path: Some("jobs".into()),
            job_selector: None,
            fields,
            headers: HashMap::new(),
            company_name: None,
            auth_type: None,
            auth_param: None,
            api_key: None,
            salary_min_field: None,
            salary_max_field: None,
        }
    }

    #[test]
    fn validation_passes_for_well_formed_api_source() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn html_source_requires_job_selector() {
        let mut cfg = valid_config();
        cfg.source_type = SourceType::Html;
        assert!(cfg.validate().is_err());
        cfg.job_selector = Some(".job-card".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn auth_requires_companion_fields() {
        let mut cfg = valid_config();
        cfg.auth_type = Some(AuthType::Bearer);
        assert!(cfg.validate().is_err());
        cfg.api_key = Some("secret".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn auto_disable_after_n_failures() {
        let mut source = JobSource {
            id: Uuid::new_v4(),
            company_id: None,
            source_type: SourceType::Api,
            config: valid_config(),
            status: SourceStatus::Active,
            discovery_confidence: DiscoveryConfidence::High,
            consecutive_failures: 0,
            last_success_at: None,
            last_failure_at: None,
            validation_required: false,
        };
        let now = Utc::now();
        for _ in 0..N_FAIL_DISABLE {
            source.record_failure(now);
        }
        assert_eq!(source.status, SourceStatus::Disabled);
        assert!(!source.is_scrapeable());
    }

    #[test]
    fn success_resets_failure_count() {
        let mut source = JobSource {
            id: Uuid::new_v4(),
            company_id: None,
            source_type: SourceType::Api,
            config: valid_config(),
            status: SourceStatus::Active,
            discovery_confidence: DiscoveryConfidence::High,
            consecutive_failures: 4,
            last_success_at: None,
            last_failure_at: None,
            validation_required: false,
        };
        source.record_success(Utc::now());
        assert_eq!(source.consecutive_failures, 0);
    }
}
