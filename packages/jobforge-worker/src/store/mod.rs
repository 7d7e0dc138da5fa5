//! Two `TaskStore` implementations: a durable Postgres-backed one for
//! production, and an in-memory one for tests (spec §10.3).

pub mod memory;
pub mod postgres;

#[cfg(test)]
pub mod test_support;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use jobforge_core::normalize::normalize_company_name;
use jobforge_core::task::TaskPayload;

/// A single key used both for "is this a duplicate child" comparisons and
/// for the "ancestor already targets this" check — the spec's `target_url`
/// generalized to kinds that have no natural URL (spec §4.1 checks 2-4).
/// Shared between [`memory::MemoryStore`] and [`postgres::PostgresStore`] so
/// the two implementations can never disagree on what counts as a duplicate.
pub(crate) fn dedupe_key(payload: &TaskPayload) -> Option<String> {
    match payload {
        TaskPayload::Company { url: Some(url), .. } => Some(url.clone()),
        TaskPayload::Company { url: None, company_name } => {
            Some(format!("company:{}", normalize_company_name(company_name)))
        }
        TaskPayload::Scrape { url } => Some(url.clone()),
        TaskPayload::SourceDiscovery { url, .. } => Some(url.clone()),
        TaskPayload::ScrapeSource { source_id } => Some(format!("source:{source_id}")),
        TaskPayload::JobListing { .. } => None,
    }
}
