//! `api` source type: fetch JSON, navigate `response_path` to the jobs
//! array, extract `fields` per item via dotted JSON path (spec §4.6, §6).

use jobforge_core::source::SourceConfig;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::auth;
use crate::error::{Result, ScrapeError};
use crate::fields::extract_from_json;
use crate::jsonpath::navigate;
use crate::normalized::NormalizedJob;

#[instrument(skip(http, config), fields(url = %config.url))]
pub async fn scrape(http: &reqwest::Client, config: &SourceConfig) -> Result<Vec<NormalizedJob>> {
    let builder = auth::apply(http.get(&config.url), config)?;
    let response = builder.send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ScrapeError::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    let body: Value = response.json().await.map_err(|e| ScrapeError::Parse(e.to_string()))?;

    let items = match &config.response_path {
        Some(path) => navigate(&body, path).unwrap_or(Value::Array(Vec::new())),
        None => body,
    };

    let Some(items) = items.as_array() else {
        return Err(ScrapeError::Parse("response_path did not resolve to an array".into()));
    };

    let mut jobs = Vec::with_capacity(items.len());
    for item in items {
        match extract_from_json(item, config) {
            Some(job) => jobs.push(job),
            None => warn!("skipping job item missing required fields (title/url)"),
        }
    }
    Ok(jobs)
}
