//! Web search client (spec §4.4): two implementations behind one interface,
//! selected by configured provider, with an optional daily-cap guard.
//!
//! Grounded directly on `tavily_client.rs`'s `BaseSearchService` trait and
//! its `NoopSearchService` fallback.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::error::{EnrichmentError, Result};

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Outcome of a search call: either a list of hits, or `Skipped` when the
/// daily-cap guard short-circuited the call before any request was made
/// (spec §4.4 `{skipped: "quota"}`).
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Results(Vec<SearchResult>),
    Skipped { reason: &'static str },
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchResult>>;
}

/// The primary implementation: a hosted search API reached over HTTP,
/// structurally identical to the teacher's `TavilyClient`.
pub struct PrimarySearchClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl PrimarySearchClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.tavily.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(serde::Serialize)]
struct SearchRequestBody<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    search_depth: &'static str,
}

#[derive(Debug, Deserialize)]
struct SearchResponseBody {
    results: Vec<SearchResultBody>,
}

#[derive(Debug, Deserialize)]
struct SearchResultBody {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl WebSearch for PrimarySearchClient {
    #[instrument(skip(self), fields(query))]
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchResult>> {
        let resp = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&SearchRequestBody {
                api_key: &self.api_key,
                query,
                max_results,
                search_depth: "basic",
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EnrichmentError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponseBody = resp.json().await.map_err(|e| EnrichmentError::Parse(e.to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                snippet: r.content,
            })
            .collect())
    }
}

/// Fallback implementation used when no provider is configured, or when the
/// primary's credentials are absent. Always returns an empty result set
/// rather than an error, matching `NoopSearchService`.
pub struct NoopSearchClient;

#[async_trait]
impl WebSearch for NoopSearchClient {
    async fn search(&self, query: &str, _max_results: u32) -> Result<Vec<SearchResult>> {
        warn!(query, "no search provider configured, returning empty results");
        Ok(Vec::new())
    }
}

/// Wraps a [`WebSearch`] implementation with the daily-cap guard from
/// spec §4.4 / §5 "Budgets". `cap_reached` is supplied by the caller (backed
/// by `TaskStore::increment_daily_search_count`), keeping this module free of
/// any store dependency.
pub struct BudgetedSearch<S: WebSearch> {
    pub inner: S,
    pub daily_cap: u32,
}

impl<S: WebSearch> BudgetedSearch<S> {
    pub fn new(inner: S, daily_cap: u32) -> Self {
        Self { inner, daily_cap }
    }

    /// `count_today` is the counter value *after* the caller has already
    /// incremented it for this call, so equality with the cap means this
    /// call itself is the one that must be skipped.
    #[instrument(skip(self, count_today))]
    pub async fn search(&self, query: &str, max_results: u32, count_today: u32) -> Result<SearchOutcome> {
        if count_today > self.daily_cap {
            return Ok(SearchOutcome::Skipped { reason: "quota" });
        }
        let results = self.inner.search(query, max_results).await?;
        Ok(SearchOutcome::Results(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_search_never_errors() {
        let client = NoopSearchClient;
        let results = client.search("anything", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn budgeted_search_skips_once_cap_exceeded() {
        let budgeted = BudgetedSearch::new(NoopSearchClient, 5);
        let outcome = budgeted.search("acme official site", 5, 6).await.unwrap();
        assert!(matches!(outcome, SearchOutcome::Skipped { reason: "quota" }));
    }

    #[tokio::test]
    async fn budgeted_search_passes_through_under_cap() {
        let budgeted = BudgetedSearch::new(NoopSearchClient, 5);
        let outcome = budgeted.search("acme official site", 5, 1).await.unwrap();
        assert!(matches!(outcome, SearchOutcome::Results(_)));
    }
}
