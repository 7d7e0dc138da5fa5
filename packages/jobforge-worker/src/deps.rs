//! Explicit dependency bundle handed to every processor (spec §9 "Global
//! singletons" redesign guidance: no ambient clients, everything constructed
//! once at startup and passed down).

use std::sync::Arc;

use jobforge_ai::AgentManager;
use jobforge_core::store::TaskStore;
use jobforge_enrichment::{
    BudgetedSearch, CombinedReferenceLookup, HtmlFetchClient, NoopSearchClient, PrimarySearchClient, Result as EnrichResult,
    SearchResult, WebSearch, WikidataClient, WikipediaClient,
};

use crate::events::EventTap;

/// Picks between the two [`WebSearch`] implementations at construction time
/// (spec §4.4 "two implementations behind one interface, selected by
/// configured provider"), so the rest of the worker can hold one concrete
/// search type instead of a trait object.
pub enum ConfiguredSearch {
    Primary(PrimarySearchClient),
    Noop(NoopSearchClient),
}

#[async_trait::async_trait]
impl WebSearch for ConfiguredSearch {
    async fn search(&self, query: &str, max_results: u32) -> EnrichResult<Vec<SearchResult>> {
        match self {
            ConfiguredSearch::Primary(client) => client.search(query, max_results).await,
            ConfiguredSearch::Noop(client) => client.search(query, max_results).await,
        }
    }
}

impl ConfiguredSearch {
    /// `Primary` when a provider API key is configured in the environment,
    /// `Noop` otherwise (spec §4.4, matching `NoopSearchService`'s role as a
    /// fallback when no provider is configured).
    pub fn from_env() -> Self {
        match std::env::var("TAVILY_API_KEY") {
            Ok(key) if !key.trim().is_empty() => ConfiguredSearch::Primary(PrimarySearchClient::new(key)),
            _ => ConfiguredSearch::Noop(NoopSearchClient),
        }
    }
}

/// Everything a processor needs beyond the claimed `Task` and the current
/// `ConfigSnapshot`, constructed once in `main` and shared across workers.
pub struct Deps {
    pub store: Arc<dyn TaskStore>,
    pub reference_lookup: CombinedReferenceLookup<WikipediaClient, WikidataClient>,
    pub search: BudgetedSearch<ConfiguredSearch>,
    pub html_client: HtmlFetchClient,
    pub ai: AgentManager,
    pub http: reqwest::Client,
    pub events: EventTap,
}
